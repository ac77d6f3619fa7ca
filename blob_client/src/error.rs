use std::io;

use thiserror::Error;

use crate::blob_id::BlobId;

/// A failure of one physical fetch attempt, as reported by a [`StorageBackend`](crate::StorageBackend).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Transient transport error: {0}")]
    Transient(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Fatal transport error: {0}")]
    Fatal(String),

    #[error("IO Error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Whether repeating the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Transient(_) => true,
            TransportError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::Interrupted
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::WouldBlock
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BlobClientError {
    #[error("Channel is closed")]
    ClosedChannel,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Blob {blob} was updated while reading (etag {expected} changed to {actual})")]
    ExternalModification {
        blob: BlobId,
        expected: String,
        actual: String,
    },

    #[error("Retries exhausted after {attempts} attempts: {source}")]
    TransportExhausted {
        attempts: usize,
        #[source]
        source: TransportError,
    },

    #[error("{0}")]
    TransportError(#[from] TransportError),

    #[error("IO Error: {0}")]
    IoError(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, BlobClientError>;

impl BlobClientError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        BlobClientError::InvalidArgument(msg.into())
    }
}

impl From<BlobClientError> for io::Error {
    fn from(err: BlobClientError) -> Self {
        let kind = match &err {
            BlobClientError::ClosedChannel => io::ErrorKind::BrokenPipe,
            BlobClientError::InvalidArgument(_) => io::ErrorKind::InvalidInput,
            BlobClientError::ExternalModification { .. } => io::ErrorKind::InvalidData,
            BlobClientError::TransportExhausted { .. } => io::ErrorKind::TimedOut,
            BlobClientError::TransportError(TransportError::NotFound(_)) => io::ErrorKind::NotFound,
            BlobClientError::TransportError(TransportError::Io(e)) => e.kind(),
            BlobClientError::IoError(e) => e.kind(),
            BlobClientError::TransportError(_) => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}
