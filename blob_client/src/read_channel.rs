use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use blob_config::{BlobConfig, blob_config};
use bytes::Bytes;
use tracing::{debug, event, warn};
use utils::UniqueId;

use crate::INFORMATION_LOG_LEVEL;
use crate::blob_id::BlobId;
use crate::captured_state::CapturedState;
use crate::codec::{StorageObject, encode_blob_id};
use crate::error::{BlobClientError, Result};
use crate::interface::StorageBackend;
use crate::options::ReadOptions;
use crate::retry_wrapper::{ExponentialBackoffPolicy, RetryPolicy, RetryWrapper};

/// The result of a single [`BlobReadChannel::read`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// This many bytes were copied into the destination; possibly fewer than it could hold.
    Data(usize),
    /// No bytes remain before the limit or the end of the blob.
    EndOfStream,
}

impl ReadOutcome {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, ReadOutcome::EndOfStream)
    }
}

/// A seekable, boundable, resumable sequential reader over a remote blob.
///
/// Each fetch requests at least `chunk_size` bytes (never crossing the limit) and serves later
/// reads from the buffered remainder.  Every fetch runs under the channel's [`RetryPolicy`], and the
/// etag returned by each non-empty fetch must match the previous one; a mismatch means the blob
/// was replaced mid-read and fails with [`BlobClientError::ExternalModification`].
///
/// The channel is driven by one caller at a time; all I/O happens synchronously inside `read`.
pub struct BlobReadChannel {
    id: UniqueId,
    backend: Arc<dyn StorageBackend>,
    retry_policy: Arc<dyn RetryPolicy>,
    log_errors_as_info: bool,

    blob: BlobId,
    storage_object: StorageObject,
    options: ReadOptions,

    last_etag: Option<String>,
    // Set when a fetch returned a conflicting etag; cleared by seek.
    conflicting_etag: Option<String>,
    // A fetch failure that followed bytes already delivered by the same call.  Reported by the next
    // read without fetching; cleared by seek.
    pending_error: Option<BlobClientError>,

    // Offset of the first byte of `buffer`, or of the next byte to fetch when there is no buffer.
    position: u64,
    limit: u64,
    chunk_size: usize,
    default_chunk_size: usize,
    is_open: bool,
    end_of_stream: bool,

    buffer: Option<Bytes>,
    buffer_pos: usize,
}

impl BlobReadChannel {
    /// Opens a channel at offset 0 with the process-wide configuration.
    pub fn open(backend: Arc<dyn StorageBackend>, blob: BlobId, options: ReadOptions) -> Self {
        Self::open_with_config(backend, blob, options, blob_config())
    }

    pub fn open_with_config(
        backend: Arc<dyn StorageBackend>,
        blob: BlobId,
        options: ReadOptions,
        config: &BlobConfig,
    ) -> Self {
        let channel = Self::new(backend, blob, options, config);
        event!(INFORMATION_LOG_LEVEL, session = %channel.id, blob = %channel.blob, "Opened read channel");
        channel
    }

    fn new(backend: Arc<dyn StorageBackend>, blob: BlobId, options: ReadOptions, config: &BlobConfig) -> Self {
        let default_chunk_size = config.reader.default_chunk_size.as_usize().max(1);

        Self {
            id: UniqueId::new(),
            backend,
            retry_policy: Arc::new(ExponentialBackoffPolicy::from_config(&config.client)),
            log_errors_as_info: config.client.log_errors_as_info,
            storage_object: encode_blob_id(&blob),
            blob,
            options,
            last_etag: None,
            conflicting_etag: None,
            pending_error: None,
            position: 0,
            limit: u64::MAX,
            chunk_size: default_chunk_size,
            default_chunk_size,
            is_open: true,
            end_of_stream: false,
            buffer: None,
            buffer_pos: 0,
        }
    }

    /// Recreates a channel from a captured state against a freshly supplied backend.
    ///
    /// The restored channel starts without a buffer, so its first read always fetches.
    pub fn restore(state: &CapturedState, backend: Arc<dyn StorageBackend>) -> Self {
        Self::restore_with_config(state, backend, blob_config())
    }

    pub fn restore_with_config(state: &CapturedState, backend: Arc<dyn StorageBackend>, config: &BlobConfig) -> Self {
        let mut channel = Self::new(backend, state.blob.clone(), state.options.clone(), config);
        channel.last_etag = state.last_etag.clone();
        channel.position = state.position;
        channel.is_open = state.is_open;
        channel.end_of_stream = state.end_of_stream;
        channel.chunk_size = if state.chunk_size == 0 {
            channel.default_chunk_size
        } else {
            state.chunk_size
        };
        channel.limit = state.limit;

        event!(
            INFORMATION_LOG_LEVEL,
            session = %channel.id,
            blob = %channel.blob,
            position = channel.position,
            "Restored read channel"
        );
        channel
    }

    pub fn with_retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Snapshot of the resumption point.  Unread buffered bytes are not kept: the snapshot points at
    /// the next byte the caller has not consumed, and a restored channel fetches them again.
    pub fn capture(&self) -> CapturedState {
        let (position, end_of_stream) = match self.buffer {
            Some(_) => (self.position + self.buffer_pos as u64, false),
            None => (self.position, self.end_of_stream),
        };

        CapturedState {
            blob: self.blob.clone(),
            options: self.options.clone(),
            position,
            is_open: self.is_open,
            end_of_stream,
            chunk_size: self.chunk_size,
            limit: self.limit,
            last_etag: self.last_etag.clone(),
        }
    }

    pub fn blob(&self) -> &BlobId {
        &self.blob
    }

    pub fn options(&self) -> &ReadOptions {
        &self.options
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Offset of the next byte `read` will return.
    pub fn position(&self) -> u64 {
        match self.buffer {
            Some(_) => self.position + self.buffer_pos as u64,
            None => self.position,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Sets the minimum number of bytes requested per fetch; `0` restores the configured default.
    pub fn set_chunk_size(&mut self, chunk_size: usize) {
        self.chunk_size = if chunk_size == 0 {
            self.default_chunk_size
        } else {
            chunk_size
        };
    }

    /// The exclusive upper bound on offsets this channel will read; `u64::MAX` when unbounded.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Sets the limit.  Buffered bytes at or past the new limit are discarded.
    pub fn set_limit(&mut self, limit: u64) -> &mut Self {
        self.limit = limit;

        if let Some(buffer) = self.buffer.take() {
            let keep = limit.saturating_sub(self.position).min(buffer.len() as u64) as usize;
            if keep > self.buffer_pos {
                self.buffer = Some(buffer.slice(..keep));
            } else {
                self.position += self.buffer_pos as u64;
                self.buffer_pos = 0;
            }
        }
        self
    }

    pub fn close(&mut self) {
        if self.is_open {
            self.buffer = None;
            self.buffer_pos = 0;
            self.is_open = false;
            event!(INFORMATION_LOG_LEVEL, session = %self.id, blob = %self.blob, "Closed read channel");
        }
    }

    fn validate_open(&self) -> Result<()> {
        if !self.is_open {
            return Err(BlobClientError::ClosedChannel);
        }
        Ok(())
    }

    /// Moves the read pointer.  Positions past the end of the blob are allowed and read as end of
    /// stream.
    pub fn seek(&mut self, position: u64) -> Result<()> {
        self.validate_open()?;
        self.position = position;
        self.buffer = None;
        self.buffer_pos = 0;
        self.end_of_stream = false;
        self.conflicting_etag = None;
        self.pending_error = None;
        Ok(())
    }

    /// Copies the next bytes of the blob into `dst`.
    ///
    /// At most one fetch is made per call, and the number of bytes returned may be smaller than
    /// `dst`, so callers loop until [`ReadOutcome::EndOfStream`].  A call that drains the buffer
    /// with room left in `dst` goes on to fetch the next chunk.  An empty `dst` returns `Data(0)`
    /// without fetching.  If that fetch fails, the bytes already copied are returned and the
    /// failure is reported by the next call.
    pub fn read(&mut self, dst: &mut [u8]) -> Result<ReadOutcome> {
        self.validate_open()?;

        if let Some(e) = self.pending_error.take() {
            return Err(e);
        }

        let mut written = 0;
        if let Some(buffer) = self.buffer.take() {
            written = self.copy_from_buffer(buffer, dst);
            if written == dst.len() {
                return Ok(ReadOutcome::Data(written));
            }
        }

        let done = |written: usize| {
            if written > 0 {
                ReadOutcome::Data(written)
            } else {
                ReadOutcome::EndOfStream
            }
        };

        if self.end_of_stream {
            return Ok(done(written));
        }

        let dst = &mut dst[written..];
        let to_read = self
            .limit
            .saturating_sub(self.position)
            .min(dst.len().max(self.chunk_size) as u64);

        if to_read == 0 {
            self.end_of_stream = true;
            return Ok(done(written));
        }

        if dst.is_empty() {
            return Ok(ReadOutcome::Data(0));
        }

        let data = match self.fetch(to_read) {
            Ok(data) => data,
            Err(e) if written > 0 => {
                debug!(session = %self.id, blob = %self.blob, "Deferring fetch failure after {written} bytes: {e}");
                self.pending_error = Some(e);
                return Ok(ReadOutcome::Data(written));
            },
            Err(e) => return Err(e),
        };

        if (data.len() as u64) < to_read {
            self.end_of_stream = true;
            if data.is_empty() {
                return Ok(done(written));
            }
        }

        self.buffer_pos = 0;
        written += self.copy_from_buffer(data, dst);
        Ok(ReadOutcome::Data(written))
    }

    /// Copies from the unread part of `buffer`, keeping it if anything is left over.
    fn copy_from_buffer(&mut self, buffer: Bytes, dst: &mut [u8]) -> usize {
        let to_write = (buffer.len() - self.buffer_pos).min(dst.len());
        dst[..to_write].copy_from_slice(&buffer[self.buffer_pos..self.buffer_pos + to_write]);
        self.buffer_pos += to_write;

        if self.buffer_pos >= buffer.len() {
            self.position += buffer.len() as u64;
            self.buffer_pos = 0;
        } else {
            self.buffer = Some(buffer);
        }
        to_write
    }

    /// One logical fetch of `length` bytes at `position`, retried under the channel's policy and
    /// checked against the etag chain.
    fn fetch(&mut self, length: u64) -> Result<Bytes> {
        if let Some(actual) = &self.conflicting_etag {
            return Err(self.external_modification(actual.clone()));
        }

        let mut wrapper = RetryWrapper::new("read", self.retry_policy.clone());
        if self.log_errors_as_info {
            wrapper = wrapper.log_errors_as_info();
        }

        let offset = self.position;
        let backend = &self.backend;
        let object = &self.storage_object;
        let options = &self.options;

        let result = wrapper.run(&self.blob, options, |_| backend.fetch_range(object, options, offset, length))?;

        debug!(
            session = %self.id,
            blob = %self.blob,
            offset,
            length,
            received = result.data.len(),
            etag = %result.etag,
            "Fetched range"
        );

        if !result.data.is_empty()
            && let Some(expected) = &self.last_etag
            && *expected != result.etag
        {
            warn!(
                session = %self.id,
                blob = %self.blob,
                expected = %expected,
                actual = %result.etag,
                "Blob changed while reading"
            );
            self.conflicting_etag = Some(result.etag.clone());
            return Err(self.external_modification(result.etag));
        }

        self.last_etag = Some(result.etag);

        let mut data = result.data;
        if data.len() as u64 > length {
            warn!(
                session = %self.id,
                blob = %self.blob,
                length,
                received = data.len(),
                "Backend returned more bytes than requested"
            );
            data.truncate(length as usize);
        }
        Ok(data)
    }

    fn external_modification(&self, actual: String) -> BlobClientError {
        BlobClientError::ExternalModification {
            blob: self.blob.clone(),
            expected: self.last_etag.clone().unwrap_or_default(),
            actual,
        }
    }
}

impl fmt::Debug for BlobReadChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobReadChannel")
            .field("id", &self.id)
            .field("blob", &self.blob)
            .field("position", &self.position())
            .field("limit", &self.limit)
            .field("chunk_size", &self.chunk_size)
            .field("is_open", &self.is_open)
            .field("end_of_stream", &self.end_of_stream)
            .finish_non_exhaustive()
    }
}

impl Read for BlobReadChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match BlobReadChannel::read(self, buf)? {
            ReadOutcome::Data(n) => Ok(n),
            ReadOutcome::EndOfStream => Ok(0),
        }
    }
}

/// Only `SeekFrom::Start` and `SeekFrom::Current` are supported: the channel does not know the
/// size of the blob.
impl Seek for BlobReadChannel {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(p) => p,
            SeekFrom::Current(delta) => self.position().checked_add_signed(delta).ok_or_else(|| {
                BlobClientError::invalid_argument(format!(
                    "seek by {delta} from {} is out of range",
                    self.position()
                ))
            })?,
            SeekFrom::End(_) => {
                let err = BlobClientError::invalid_argument("seeking relative to the end of a blob is not supported");
                return Err(err.into());
            },
        };

        BlobReadChannel::seek(self, target)?;
        Ok(target)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.position())
    }
}
