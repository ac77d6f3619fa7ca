use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BlobClientError;

/// Identity of a blob: bucket, object name and, optionally, a pinned generation.
///
/// A `BlobId` without a generation addresses whatever generation is live at the time of each
/// fetch; consistency across fetches is then enforced through etags by the read channel.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlobId {
    bucket: String,
    name: String,
    generation: Option<i64>,
}

impl BlobId {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
            generation: None,
        }
    }

    pub fn with_generation(mut self, generation: i64) -> Self {
        self.generation = Some(generation);
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn generation(&self) -> Option<i64> {
        self.generation
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.name)?;
        if let Some(generation) = self.generation {
            write!(f, "#{generation}")?;
        }
        Ok(())
    }
}

/// Parses `bucket/name`, `bucket/name#generation`, optionally prefixed with `gs://`.
impl FromStr for BlobId {
    type Err = BlobClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("gs://").unwrap_or(s);

        let (path, generation) = match s.rsplit_once('#') {
            Some((path, generation)) => {
                let generation = generation
                    .parse::<i64>()
                    .map_err(|_| BlobClientError::invalid_argument(format!("invalid generation '{generation}'")))?;
                (path, Some(generation))
            },
            None => (s, None),
        };

        let Some((bucket, name)) = path.split_once('/') else {
            return Err(BlobClientError::invalid_argument(format!("blob '{s}' must have the form bucket/name")));
        };

        if bucket.is_empty() || name.is_empty() {
            return Err(BlobClientError::invalid_argument(format!("blob '{s}' has an empty bucket or name")));
        }

        Ok(Self {
            bucket: bucket.to_owned(),
            name: name.to_owned(),
            generation,
        })
    }
}
