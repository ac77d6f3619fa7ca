mod aliases;
pub use aliases::ENVIRONMENT_NAME_ALIASES;

pub mod macros;
pub mod blob_config;

pub mod groups;

// Re-export for use in the config_group macro
pub use utils::configuration_utils::ParsableConfigValue;
pub use blob_config::{BlobConfig, blob_config};

pub type ClientConfig = groups::client::ConfigValues;
pub type ReaderConfig = groups::reader::ConfigValues;
pub type LogConfig = groups::log::ConfigValues;

#[doc(hidden)]
pub use {const_str, konst};
