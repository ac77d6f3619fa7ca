//! Resume tokens: a captured read serialized as JSON, so an interrupted download can be picked up
//! by another process.

use std::io::Write;
use std::path::Path;

use blob_client::CapturedState;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::errors::*;

const TOKEN_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct ResumeToken {
    version: u32,
    state: CapturedState,
}

pub fn encode_token(state: &CapturedState) -> Result<String> {
    Ok(serde_json::to_string(&ResumeToken {
        version: TOKEN_VERSION,
        state: state.clone(),
    })?)
}

pub fn decode_token(token: &str) -> Result<CapturedState> {
    let token: ResumeToken = serde_json::from_str(token)?;
    if token.version != TOKEN_VERSION {
        return Err(DataProcessingError::parameter_error(format!(
            "unsupported resume token version {} (expected {TOKEN_VERSION})",
            token.version
        )));
    }
    Ok(token.state)
}

/// Writes the token next to `path` and moves it into place, so a crash never leaves a torn token.
pub fn save_token(state: &CapturedState, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(encode_token(state)?.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

pub fn load_token(path: impl AsRef<Path>) -> Result<CapturedState> {
    decode_token(&std::fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use blob_client::client_testing_utils::MemoryBackend;
    use blob_client::{BlobId, BlobReadChannel, ReadOptions};
    use blob_config::BlobConfig;

    use super::*;

    fn captured() -> CapturedState {
        let mut channel = BlobReadChannel::open_with_config(
            MemoryBackend::new(b"0123456789".to_vec()),
            BlobId::new("bucket", "name").with_generation(3),
            ReadOptions::new(),
            &BlobConfig::for_testing(),
        );
        channel.set_chunk_size(4);
        let mut buf = [0u8; 3];
        channel.read(&mut buf).unwrap();
        channel.capture()
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resume.json");
        let state = captured();

        save_token(&state, &path).unwrap();
        assert_eq!(load_token(&path).unwrap(), state);

        // Saving again replaces the token.
        save_token(&state, &path).unwrap();
        assert_eq!(load_token(&path).unwrap(), state);
    }

    #[test]
    fn test_rejects_other_versions() {
        let token = encode_token(&captured()).unwrap();
        let mut value: serde_json::Value = serde_json::from_str(&token).unwrap();
        value["version"] = serde_json::json!(99);

        let err = decode_token(&value.to_string()).unwrap_err();
        assert!(matches!(err, DataProcessingError::ParameterError(_)));

        assert!(matches!(decode_token("not json"), Err(DataProcessingError::ResumeTokenError(_))));
    }
}
