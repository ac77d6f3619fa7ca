use std::fmt;

use serde::{Deserialize, Serialize};

use crate::blob_id::BlobId;
use crate::options::ReadOptions;

/// The resumption point of a [`BlobReadChannel`](crate::BlobReadChannel), detached from any backend.
///
/// Produced by [`BlobReadChannel::capture`](crate::BlobReadChannel::capture) and turned back into a
/// channel by [`BlobReadChannel::restore`](crate::BlobReadChannel::restore).  The value is plain
/// data: it can be compared, hashed, cloned, sent to another thread or serialized and handed to
/// another process.  Buffered bytes are never part of it.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapturedState {
    pub(crate) blob: BlobId,
    pub(crate) options: ReadOptions,
    pub(crate) position: u64,
    pub(crate) is_open: bool,
    pub(crate) end_of_stream: bool,
    pub(crate) chunk_size: usize,
    pub(crate) limit: u64,
    pub(crate) last_etag: Option<String>,
}

impl CapturedState {
    pub fn blob(&self) -> &BlobId {
        &self.blob
    }

    pub fn options(&self) -> &ReadOptions {
        &self.options
    }

    /// Offset of the first byte a restored channel will return.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn last_etag(&self) -> Option<&str> {
        self.last_etag.as_deref()
    }
}

impl fmt::Debug for CapturedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedState")
            .field("blob", &self.blob)
            .field("position", &self.position)
            .field("is_open", &self.is_open)
            .field("end_of_stream", &self.end_of_stream)
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}
