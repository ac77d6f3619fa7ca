use std::time::Duration;

crate::config_group!({

    /// The maximum number of physical attempts made for a single logical fetch, including the first.
    ///
    /// The default value is 6.
    ///
    /// Use the environment variable `BLOBRS_CLIENT_RETRY_MAX_ATTEMPTS` to set this value.
    ref retry_max_attempts: usize = 6;

    /// The delay before the first retry; later retries back off exponentially from this value.
    ///
    /// The default value is 1 second.
    ///
    /// Use the environment variable `BLOBRS_CLIENT_RETRY_BASE_DELAY` to set this value.
    ref retry_base_delay: Duration = Duration::from_secs(1);

    /// The upper bound on the delay between two attempts.
    ///
    /// The default value is 32 seconds.
    ///
    /// Use the environment variable `BLOBRS_CLIENT_RETRY_MAX_DELAY` to set this value.
    ref retry_max_delay: Duration = Duration::from_secs(32);

    /// Log failed attempts at info level instead of error level.
    ///
    /// Use the environment variable `BLOBRS_CLIENT_LOG_ERRORS_AS_INFO` to set this value.
    ref log_errors_as_info: bool = false;
});
