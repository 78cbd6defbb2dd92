//! HTTP client for the usage endpoint.
//!
//! Concrete [`UsageFetcher`] implementation over the OAuth usage API, plus a
//! mock snapshot source for dry runs and tests. Requests are blocking with a
//! bounded timeout; retry behavior is layered on by [`crate::fetcher`].

use crate::config::ApiConfig;
use crate::errors::FetchError;
use crate::fetcher::UsageFetcher;
use crate::models::UsageSnapshot;
use chrono::{Duration, Utc};
use tracing::debug;

const API_BETA_HEADER: &str = "oauth-2025-04-20";
const USER_AGENT: &str = concat!("claude-watch/", env!("CARGO_PKG_VERSION"));

/// Environment variable holding the OAuth access token. Credential retrieval
/// beyond this is out of scope; a wrapping integration supplies the token.
pub const TOKEN_ENV_VAR: &str = "CLAUDE_CODE_OAUTH_TOKEN";

pub struct ApiClient {
    http: reqwest::blocking::Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, token: String) -> Result<Self, FetchError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            token,
        })
    }

    /// Build a client with the token from the environment.
    pub fn from_env(config: &ApiConfig) -> Result<Self, FetchError> {
        let token = std::env::var(TOKEN_ENV_VAR).map_err(|_| {
            FetchError::Auth(format!("No access token found (set {})", TOKEN_ENV_VAR))
        })?;
        Self::new(config, token)
    }
}

impl UsageFetcher for ApiClient {
    fn fetch_usage(&self) -> Result<UsageSnapshot, FetchError> {
        debug!(url = %self.base_url, "Fetching usage snapshot");

        let response = self
            .http
            .get(&self.base_url)
            .bearer_auth(&self.token)
            .header("anthropic-beta", API_BETA_HEADER)
            .header("Content-Type", "application/json")
            .header("User-Agent", USER_AGENT)
            .send()
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    FetchError::Network(e.to_string())
                } else {
                    FetchError::Api {
                        status: 0,
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if status.as_u16() == 401 {
            return Err(FetchError::Auth("Your session may have expired.".into()));
        }
        if !status.is_success() {
            return Err(FetchError::Api {
                status: status.as_u16(),
                message: status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string(),
            });
        }

        response
            .json::<UsageSnapshot>()
            .map_err(|e| FetchError::Api {
                status: status.as_u16(),
                message: format!("unparseable response body: {}", e),
            })
    }
}

/// Deterministic-shape fake reading for `--dry-run` mode. Matches the wire
/// format of the real endpoint.
pub fn mock_snapshot() -> UsageSnapshot {
    let now = Utc::now();
    UsageSnapshot {
        timestamp: now,
        five_hour: Some(crate::models::UsageWindow {
            utilization: 34.5,
            resets_at: Some(now + Duration::hours(3) + Duration::minutes(15)),
        }),
        seven_day: Some(crate::models::UsageWindow {
            utilization: 12.3,
            resets_at: Some(now + Duration::days(4) + Duration::hours(9)),
        }),
        seven_day_sonnet: Some(crate::models::UsageWindow {
            utilization: 8.1,
            resets_at: Some(now + Duration::days(3) + Duration::hours(15)),
        }),
        seven_day_opus: None,
        extra_usage: Some(crate::models::ExtraUsage {
            is_enabled: false,
            credits: None,
        }),
    }
}
