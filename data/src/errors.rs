use blob_client::BlobClientError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataProcessingError {
    #[error("Blob client error : {0}")]
    BlobClientError(#[from] BlobClientError),

    #[error("I/O error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("Resume token error: {0}")]
    ResumeTokenError(#[from] serde_json::Error),

    #[error("Parameter error: {0}")]
    ParameterError(String),
}

pub type Result<T> = std::result::Result<T, DataProcessingError>;

impl DataProcessingError {
    pub fn parameter_error(msg: impl Into<String>) -> Self {
        DataProcessingError::ParameterError(msg.into())
    }
}
