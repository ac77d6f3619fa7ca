use bytes::Bytes;

use crate::codec::StorageObject;
use crate::error::TransportError;
use crate::options::ReadOptions;

/// The result of one ranged fetch: the object's etag at the time of the fetch and the bytes read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchResult {
    pub etag: String,
    pub data: Bytes,
}

impl FetchResult {
    pub fn new(etag: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            etag: etag.into(),
            data: data.into(),
        }
    }
}

/// A connection to an object store capable of ranged reads.
///
/// Implementations perform exactly one physical request per call and never retry on their own;
/// retries are driven by the caller through a [`RetryPolicy`](crate::RetryPolicy).
pub trait StorageBackend: Send + Sync {
    /// Reads up to `length` bytes of `object` starting at `offset`.
    ///
    /// Returning fewer than `length` bytes means the end of the object was reached; a fetch that
    /// starts at or past the end returns empty data, not an error.
    fn fetch_range(
        &self,
        object: &StorageObject,
        options: &ReadOptions,
        offset: u64,
        length: u64,
    ) -> Result<FetchResult, TransportError>;
}
