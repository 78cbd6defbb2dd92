//! Fetcher contract and retry policy.
//!
//! The core depends only on [`UsageFetcher`]: a zero-argument operation that
//! produces a [`UsageSnapshot`] or a typed [`FetchError`]. The concrete HTTP
//! client lives in [`crate::client`]; tests substitute their own
//! implementations.
//!
//! [`fetch_with_retry`] is the bounded-retry collaborator the contract allows
//! for: exponential backoff with jitter on transient failures only. The core
//! components never retry on their own.

use crate::errors::FetchError;
use crate::models::UsageSnapshot;
use rand::Rng;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// A source of usage snapshots. The single external input of the pipeline.
pub trait UsageFetcher {
    fn fetch_usage(&self) -> Result<UsageSnapshot, FetchError>;
}

/// Closures are enough for tests and simple adapters.
impl<F> UsageFetcher for F
where
    F: Fn() -> Result<UsageSnapshot, FetchError>,
{
    fn fetch_usage(&self) -> Result<UsageSnapshot, FetchError> {
        self()
    }
}

/// Bounded exponential backoff with jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-indexed): `base * 2^attempt`
    /// capped at `max_delay`, plus up to 50% random jitter to avoid
    /// thundering-herd polling.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);
        let jitter = exp.mul_f64(rand::thread_rng().gen_range(0.0..0.5));
        exp + jitter
    }
}

/// Invoke the fetcher, retrying transient failures per the policy.
/// Authentication failures and non-retryable API errors surface immediately.
pub fn fetch_with_retry(
    fetcher: &dyn UsageFetcher,
    policy: &RetryPolicy,
) -> Result<UsageSnapshot, FetchError> {
    let mut attempt = 0;
    loop {
        match fetcher.fetch_usage() {
            Ok(snapshot) => return Ok(snapshot),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                let delay = policy.backoff_delay(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient fetch failure, retrying"
                );
                thread::sleep(delay);
                attempt += 1;
            }
            Err(e) => {
                debug!(error = %e, attempts = attempt + 1, "Fetch failed");
                return Err(e);
            }
        }
    }
}
