use std::fmt;

use serde::{Deserialize, Serialize};

/// A request option applied to every fetch made on behalf of a read.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BlobSourceOption {
    /// Fail the request unless the live generation equals this value.
    IfGenerationMatch(i64),
    /// Fail the request if the live generation equals this value.
    IfGenerationNotMatch(i64),
    /// Fail the request unless the live metageneration equals this value.
    IfMetagenerationMatch(i64),
    /// Fail the request if the live metageneration equals this value.
    IfMetagenerationNotMatch(i64),
    /// Base64 encoded customer-supplied AES-256 key for objects encrypted with such a key.
    DecryptionKey(String),
    /// Project billed for the request when the bucket has requester-pays enabled.
    UserProject(String),
    /// Return stored bytes as-is instead of transparently decompressing them.
    ReturnRawInputStream(bool),
}

impl BlobSourceOption {
    fn kind(&self) -> u8 {
        match self {
            BlobSourceOption::IfGenerationMatch(_) => 0,
            BlobSourceOption::IfGenerationNotMatch(_) => 1,
            BlobSourceOption::IfMetagenerationMatch(_) => 2,
            BlobSourceOption::IfMetagenerationNotMatch(_) => 3,
            BlobSourceOption::DecryptionKey(_) => 4,
            BlobSourceOption::UserProject(_) => 5,
            BlobSourceOption::ReturnRawInputStream(_) => 6,
        }
    }
}

impl fmt::Debug for BlobSourceOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobSourceOption::IfGenerationMatch(g) => f.debug_tuple("IfGenerationMatch").field(g).finish(),
            BlobSourceOption::IfGenerationNotMatch(g) => f.debug_tuple("IfGenerationNotMatch").field(g).finish(),
            BlobSourceOption::IfMetagenerationMatch(g) => f.debug_tuple("IfMetagenerationMatch").field(g).finish(),
            BlobSourceOption::IfMetagenerationNotMatch(g) => {
                f.debug_tuple("IfMetagenerationNotMatch").field(g).finish()
            },
            BlobSourceOption::DecryptionKey(_) => f.write_str("DecryptionKey(<redacted>)"),
            BlobSourceOption::UserProject(p) => f.debug_tuple("UserProject").field(p).finish(),
            BlobSourceOption::ReturnRawInputStream(b) => f.debug_tuple("ReturnRawInputStream").field(b).finish(),
        }
    }
}

/// The request options of a read, at most one per option kind, kept in a canonical order so that
/// equal option sets compare and hash equal regardless of insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "SerializedReadOptions")]
pub struct ReadOptions {
    options: Vec<BlobSourceOption>,
}

// Same shape as `ReadOptions`; deserialized input is put back into canonical order.
#[derive(Deserialize)]
struct SerializedReadOptions {
    options: Vec<BlobSourceOption>,
}

impl From<SerializedReadOptions> for ReadOptions {
    fn from(value: SerializedReadOptions) -> Self {
        value.options.into_iter().collect()
    }
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an option, replacing any existing option of the same kind.
    pub fn with(mut self, option: BlobSourceOption) -> Self {
        self.set(option);
        self
    }

    pub fn set(&mut self, option: BlobSourceOption) {
        match self.options.binary_search_by_key(&option.kind(), BlobSourceOption::kind) {
            Ok(idx) => self.options[idx] = option,
            Err(idx) => self.options.insert(idx, option),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlobSourceOption> {
        self.options.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn if_generation_match(&self) -> Option<i64> {
        self.iter().find_map(|o| match o {
            BlobSourceOption::IfGenerationMatch(g) => Some(*g),
            _ => None,
        })
    }

    pub fn if_generation_not_match(&self) -> Option<i64> {
        self.iter().find_map(|o| match o {
            BlobSourceOption::IfGenerationNotMatch(g) => Some(*g),
            _ => None,
        })
    }

    pub fn if_metageneration_match(&self) -> Option<i64> {
        self.iter().find_map(|o| match o {
            BlobSourceOption::IfMetagenerationMatch(g) => Some(*g),
            _ => None,
        })
    }

    pub fn if_metageneration_not_match(&self) -> Option<i64> {
        self.iter().find_map(|o| match o {
            BlobSourceOption::IfMetagenerationNotMatch(g) => Some(*g),
            _ => None,
        })
    }

    pub fn user_project(&self) -> Option<&str> {
        self.iter().find_map(|o| match o {
            BlobSourceOption::UserProject(p) => Some(p.as_str()),
            _ => None,
        })
    }
}

impl FromIterator<BlobSourceOption> for ReadOptions {
    fn from_iter<T: IntoIterator<Item = BlobSourceOption>>(iter: T) -> Self {
        let mut options = ReadOptions::new();
        for option in iter {
            options.set(option);
        }
        options
    }
}
