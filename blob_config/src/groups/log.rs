crate::config_group!({

    /// Default filter directive for command line tools, e.g. `info` or `blob_client=debug`.
    /// `RUST_LOG` takes precedence when set.
    ///
    /// Use the environment variable `BLOBRS_LOG_LEVEL` to set this value.
    ref level: String = "info".to_owned();

    /// Output format for command line tools: `text` or `json`.
    ///
    /// Use the environment variable `BLOBRS_LOG_FORMAT` to set this value.
    ref format: String = "text".to_owned();
});
