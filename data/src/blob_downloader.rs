use std::io::Write;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use blob_client::{BlobId, BlobReadChannel, CapturedState, ReadOptions, ReadOutcome, RetryPolicy, StorageBackend};
use blob_config::{BlobConfig, blob_config};
use tempfile::NamedTempFile;
use tracing::{info, instrument};

use crate::errors::*;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Downloads blobs, or parts of them, through read channels over a storage backend.
pub struct BlobDownloader {
    backend: Arc<dyn StorageBackend>,
    config: BlobConfig,
    chunk_size: Option<usize>,
    retry_policy: Option<Arc<dyn RetryPolicy>>,
}

impl BlobDownloader {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self::with_config(backend, blob_config().clone())
    }

    pub fn with_config(backend: Arc<dyn StorageBackend>, config: BlobConfig) -> Self {
        Self {
            backend,
            config,
            chunk_size: None,
            retry_policy: None,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    pub fn with_retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    fn configure(&self, mut channel: BlobReadChannel) -> BlobReadChannel {
        if let Some(chunk_size) = self.chunk_size {
            channel.set_chunk_size(chunk_size);
        }
        if let Some(policy) = &self.retry_policy {
            channel = channel.with_retry_policy(policy.clone());
        }
        channel
    }

    fn open_channel(&self, blob: &BlobId, options: &ReadOptions) -> BlobReadChannel {
        self.configure(BlobReadChannel::open_with_config(
            self.backend.clone(),
            blob.clone(),
            options.clone(),
            &self.config,
        ))
    }

    /// Writes the blob, or the given byte range of it, to `writer`.  Returns the number of bytes
    /// written; a range extending past the end of the blob is cut short without error.
    #[instrument(skip_all, name = "BlobDownloader::download_to_writer", fields(blob = %blob))]
    pub fn download_to_writer(
        &self,
        blob: &BlobId,
        options: &ReadOptions,
        range: Option<Range<u64>>,
        writer: &mut impl Write,
    ) -> Result<u64> {
        let mut channel = self.open_channel(blob, options);

        if let Some(range) = range {
            if range.start > range.end {
                return Err(DataProcessingError::parameter_error(format!(
                    "invalid byte range {}..{}",
                    range.start, range.end
                )));
            }
            channel.seek(range.start)?;
            channel.set_limit(range.end);
        }

        let n_bytes = copy_channel(&mut channel, writer, None)?;
        writer.flush()?;
        channel.close();

        Ok(n_bytes)
    }

    /// Downloads the whole blob to `path`.  The file only appears once the download completed.
    #[instrument(skip_all, name = "BlobDownloader::download_to_path", fields(blob = %blob))]
    pub fn download_to_path(&self, blob: &BlobId, options: &ReadOptions, path: impl AsRef<Path>) -> Result<u64> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        let n_bytes = self.download_to_writer(blob, options, None, tmp.as_file_mut())?;
        tmp.persist(path).map_err(|e| e.error)?;

        info!("Downloaded {n_bytes} bytes of {blob} to {path:?}");
        Ok(n_bytes)
    }

    /// Writes at most `max_bytes` of the blob to `writer`, then captures where the read stopped.
    ///
    /// The captured state resumes with [`BlobDownloader::resume_to_writer`], from this or any other
    /// downloader over the same store.
    #[instrument(skip_all, name = "BlobDownloader::download_partial", fields(blob = %blob, max_bytes = max_bytes))]
    pub fn download_partial(
        &self,
        blob: &BlobId,
        options: &ReadOptions,
        max_bytes: u64,
        writer: &mut impl Write,
    ) -> Result<(u64, CapturedState)> {
        let mut channel = self.open_channel(blob, options);
        let n_bytes = copy_channel(&mut channel, writer, Some(max_bytes))?;
        writer.flush()?;

        let state = channel.capture();
        channel.close();

        info!("Stopped {blob} after {n_bytes} bytes at position {}", state.position());
        Ok((n_bytes, state))
    }

    /// Restores the captured read and writes everything that remains to `writer`.
    #[instrument(
        skip_all,
        name = "BlobDownloader::resume_to_writer",
        fields(blob = %state.blob(), position = state.position())
    )]
    pub fn resume_to_writer(&self, state: &CapturedState, writer: &mut impl Write) -> Result<u64> {
        if !state.is_open() {
            return Err(DataProcessingError::parameter_error(format!(
                "cannot resume {}: the read was closed when it was captured",
                state.blob()
            )));
        }

        let channel = BlobReadChannel::restore_with_config(state, self.backend.clone(), &self.config);
        let mut channel = self.configure(channel);
        let n_bytes = copy_channel(&mut channel, writer, None)?;
        writer.flush()?;
        channel.close();

        Ok(n_bytes)
    }
}

/// Copies from `channel` to `writer` until end of stream or until `max_bytes` were copied.
fn copy_channel(channel: &mut BlobReadChannel, writer: &mut impl Write, max_bytes: Option<u64>) -> Result<u64> {
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let want = match max_bytes {
            Some(max) => (max - total).min(buf.len() as u64) as usize,
            None => buf.len(),
        };
        if want == 0 {
            break;
        }

        match channel.read(&mut buf[..want])? {
            ReadOutcome::Data(n) => {
                writer.write_all(&buf[..n])?;
                total += n as u64;
            },
            ReadOutcome::EndOfStream => break,
        }
    }

    Ok(total)
}
