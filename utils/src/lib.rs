#![cfg_attr(feature = "strict", deny(warnings))]

pub mod byte_size;
pub use byte_size::{ByteSize, ByteSizeParseError};

pub mod configuration_utils;
pub use configuration_utils::ParsableConfigValue;

mod guards;
pub use guards::EnvVarGuard;

mod unique_id;
pub use unique_id::UniqueId;
