use lazy_static::lazy_static;

use crate::groups;

lazy_static! {
    static ref GLOBAL_CONFIG: BlobConfig = BlobConfig::new();
}

/// The process-wide configuration, read from the environment on first use.
pub fn blob_config() -> &'static BlobConfig {
    &GLOBAL_CONFIG
}

/// Primary configuration struct containing all config sections
#[derive(Debug, Clone, Default)]
pub struct BlobConfig {
    pub client: groups::client::ConfigValues,
    pub reader: groups::reader::ConfigValues,
    pub log: groups::log::ConfigValues,
}

impl BlobConfig {
    /// Create a new BlobConfig instance with default values and apply environment variable overrides.
    /// This is equivalent to `BlobConfig::default().with_env_overrides()`.
    pub fn new() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply environment variable overrides to all configuration sections.
    /// Environment variables follow the pattern: BLOBRS_{GROUP_NAME}_{FIELD_NAME}
    pub fn with_env_overrides(mut self) -> Self {
        self.client.apply_env_overrides();
        self.reader.apply_env_overrides();
        self.log.apply_env_overrides();
        self
    }

    /// Settings for tests: no backoff between retries, so failure paths run instantly.
    pub fn for_testing() -> Self {
        let mut config = Self::default();
        config.client.retry_base_delay = std::time::Duration::ZERO;
        config.client.retry_max_delay = std::time::Duration::ZERO;
        config.client.log_errors_as_info = true;
        config
    }
}
