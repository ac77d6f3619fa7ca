mod blob_downloader;
pub mod errors;
pub mod resume_token;

pub use blob_downloader::BlobDownloader;
pub use errors::{DataProcessingError, Result};
