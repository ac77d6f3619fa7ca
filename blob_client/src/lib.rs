pub use blob_id::BlobId;
pub use captured_state::CapturedState;
pub use codec::{StorageObject, decode_blob_id, encode_blob_id};
pub use error::{BlobClientError, Result, TransportError};
pub use interface::{FetchResult, StorageBackend};
pub use local_client::LocalClient;
pub use options::{BlobSourceOption, ReadOptions};
pub use read_channel::{BlobReadChannel, ReadOutcome};
pub use retry_wrapper::{AttemptContext, ExponentialBackoffPolicy, NoRetryPolicy, RetryDecision, RetryPolicy};
use tracing::Level;

mod blob_id;
mod captured_state;
pub mod codec;
mod error;
mod interface;
mod local_client;
mod options;
mod read_channel;
pub mod retry_wrapper;

pub mod client_testing_utils;

#[cfg(not(feature = "elevated_information_level"))]
pub const INFORMATION_LOG_LEVEL: Level = Level::DEBUG;

#[cfg(feature = "elevated_information_level")]
pub const INFORMATION_LOG_LEVEL: Level = Level::INFO;
