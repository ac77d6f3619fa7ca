use std::sync::Arc;
use std::time::Duration;

use blob_config::ClientConfig;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{error, info};

use crate::blob_id::BlobId;
use crate::error::{BlobClientError, Result, TransportError};
use crate::options::ReadOptions;

/// Everything a [`RetryPolicy`] gets to see about a failed attempt.
#[derive(Debug)]
pub struct AttemptContext<'a> {
    pub api_tag: &'static str,
    pub blob: &'a BlobId,
    pub options: &'a ReadOptions,
    /// Zero-based index of the attempt that just failed.
    pub attempt: usize,
    pub error: &'a TransportError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    GiveUp,
}

/// Decides, per failed physical attempt, whether and when to try again.
pub trait RetryPolicy: Send + Sync {
    fn should_retry(&self, ctx: &AttemptContext<'_>) -> RetryDecision;
}

/// Retries transient failures with jittered exponential backoff, up to a fixed number of attempts.
#[derive(Debug, Clone)]
pub struct ExponentialBackoffPolicy {
    max_attempts: usize,
    base_delay: Duration,
    max_delay: Duration,
    use_jitter: bool,
}

impl ExponentialBackoffPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            use_jitter: true,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.retry_max_attempts, config.retry_base_delay, config.retry_max_delay)
    }

    pub fn without_jitter(mut self) -> Self {
        self.use_jitter = false;
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// The delay before retrying after the failure of attempt `attempt`: `base * 2^attempt`, capped.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let base_ms = self.base_delay.as_millis().min(u64::MAX as u128) as u64;

        // tokio-retry raises the base to successive powers, so start from 2 and scale by half the base.
        let delay = ExponentialBackoff::from_millis(2)
            .factor(base_ms.div_ceil(2))
            .max_delay(self.max_delay)
            .nth(attempt)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);

        if self.use_jitter { jitter(delay) } else { delay }
    }
}

impl RetryPolicy for ExponentialBackoffPolicy {
    fn should_retry(&self, ctx: &AttemptContext<'_>) -> RetryDecision {
        if !ctx.error.is_transient() || ctx.attempt + 1 >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry {
            delay: self.delay_for(ctx.attempt),
        }
    }
}

/// Never retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetryPolicy;

impl RetryPolicy for NoRetryPolicy {
    fn should_retry(&self, _ctx: &AttemptContext<'_>) -> RetryDecision {
        RetryDecision::GiveUp
    }
}

/// Runs the physical attempts of one logical operation under a [`RetryPolicy`].
pub struct RetryWrapper {
    api_tag: &'static str,
    policy: Arc<dyn RetryPolicy>,
    log_errors_as_info: bool,
}

impl RetryWrapper {
    pub fn new(api_tag: &'static str, policy: Arc<dyn RetryPolicy>) -> Self {
        Self {
            api_tag,
            policy,
            log_errors_as_info: false,
        }
    }

    pub fn log_errors_as_info(mut self) -> Self {
        self.log_errors_as_info = true;
        self
    }

    fn log_failure(&self, context: &str, log_as_info: bool, try_idx: usize, blob: &BlobId, err: &TransportError) {
        let api = self.api_tag;
        let msg = if try_idx > 0 {
            format!("{context}: {api} call for {blob} failed (retry {try_idx}): {err}")
        } else {
            format!("{context}: {api} call for {blob} failed: {err}")
        };

        if self.log_errors_as_info || log_as_info {
            info!("{msg}");
        } else {
            error!("{msg}");
        }
    }

    /// Run `attempt_fn` until it succeeds or the policy gives up.
    ///
    /// `attempt_fn` receives the zero-based attempt index.  A failure the policy declines to retry is
    /// returned as [`BlobClientError::TransportExhausted`] if it was transient, and as
    /// [`BlobClientError::TransportError`] otherwise.  Partial results are never returned.
    pub fn run<T, F>(self, blob: &BlobId, options: &ReadOptions, mut attempt_fn: F) -> Result<T>
    where
        F: FnMut(usize) -> std::result::Result<T, TransportError>,
    {
        let mut try_idx = 0;

        loop {
            let err = match attempt_fn(try_idx) {
                Ok(v) => {
                    if try_idx > 0 {
                        let api = self.api_tag;
                        info!("Request Success: {api} call for {blob} succeeded (retry {try_idx}).");
                    }
                    return Ok(v);
                },
                Err(e) => e,
            };

            let ctx = AttemptContext {
                api_tag: self.api_tag,
                blob,
                options,
                attempt: try_idx,
                error: &err,
            };

            match self.policy.should_retry(&ctx) {
                RetryDecision::Retry { delay } => {
                    self.log_failure("Retryable Client Error", true, try_idx, blob, &err);
                    info!(api = self.api_tag, ?delay, "Retrying after attempt {}", try_idx + 1);
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    try_idx += 1;
                },
                RetryDecision::GiveUp if err.is_transient() => {
                    self.log_failure("No more retries; aborting", false, try_idx, blob, &err);
                    return Err(BlobClientError::TransportExhausted {
                        attempts: try_idx + 1,
                        source: err,
                    });
                },
                RetryDecision::GiveUp => {
                    self.log_failure("Fatal Client Error", false, try_idx, blob, &err);
                    return Err(BlobClientError::TransportError(err));
                },
            }
        }
    }
}
