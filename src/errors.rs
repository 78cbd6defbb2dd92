//! Typed failure taxonomy for the fetcher contract.
//!
//! The cache manager and retry policy both branch on error class: network and
//! retryable API failures may be retried or recovered from stale cache, while
//! authentication failures are fatal for the invocation and never retried.

use thiserror::Error;

/// HTTP statuses worth retrying: request timeout, rate limit, server errors.
pub const RETRYABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure: DNS, connect, timeout, proxy.
    #[error("network error: {0}")]
    Network(String),

    /// Credential rejected or expired. Never retried, never masked by cache.
    #[error("authentication failed: {0}\nPlease re-authenticate with Claude Code.")]
    Auth(String),

    /// The endpoint answered but not usefully: bad status or unparseable body.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl FetchError {
    /// Whether a retry has any chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(_) => true,
            FetchError::Auth(_) => false,
            FetchError::Api { status, .. } => RETRYABLE_STATUS_CODES.contains(status),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, FetchError::Auth(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_errors_are_transient() {
        assert!(FetchError::Network("connection refused".into()).is_transient());
    }

    #[test]
    fn test_auth_errors_are_never_transient() {
        let err = FetchError::Auth("session expired".into());
        assert!(!err.is_transient());
        assert!(err.is_auth());
    }

    #[test]
    fn test_api_errors_transient_by_status() {
        let retryable = FetchError::Api {
            status: 503,
            message: "overloaded".into(),
        };
        let fatal = FetchError::Api {
            status: 400,
            message: "bad request".into(),
        };
        assert!(retryable.is_transient());
        assert!(!fatal.is_transient());
    }
}
