//! Configuration system
//!
//! Provides centralized configuration management with:
//! - Environment variable support
//! - Config file loading (optional)
//! - Runtime defaults
//! - Validation and type safety
//!
//! Configuration is loaded once at startup and passed to each component
//! explicitly; there is no ambient global.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Snapshot cache configuration
    pub cache: CacheConfig,

    /// History retention configuration
    pub history: HistoryConfig,

    /// Threshold notification configuration
    pub notifications: NotificationConfig,

    /// Analytics configuration
    pub analytics: AnalyticsConfig,

    /// Usage API configuration
    pub api: ApiConfig,

    /// Paths configuration
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum age in seconds at which a cached reading is still fresh.
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Records older than this horizon are pruned on every write.
    pub retention_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Alert thresholds in ascending order.
    pub thresholds: Vec<u8>,
    /// Usage below this floor clears the fired-threshold state.
    pub reset_floor: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Width of the day-of-week peak buckets, in hours. Must divide 24.
    pub peak_bucket_hours: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the cache, history, and notification state files.
    pub data_dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "ERROR".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_seconds: 60 }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            retention_days: 180,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            thresholds: vec![80, 90, 95],
            reset_floor: 50.0,
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            peak_bucket_hours: 4,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com/api/oauth/usage".to_string(),
            timeout_seconds: 10,
            max_retries: 3,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".claude"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            cache: CacheConfig::default(),
            history: HistoryConfig::default(),
            notifications: NotificationConfig::default(),
            analytics: AnalyticsConfig::default(),
            api: ApiConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment, file, and defaults
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        // Try to load from config file if it exists
        let config_paths = [
            PathBuf::from("claude-watch.toml"),
            PathBuf::from(".claude-watch.toml"),
            dirs::config_dir()
                .map(|d| d.join("claude-watch").join("config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.exists() {
                info!(config_file = %path.display(), "Loading configuration from file");
                config = Self::load_from_file(path)?;
                break;
            }
        }

        // Override with environment variables
        config.apply_env_overrides()?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        // Logging overrides
        if let Ok(val) = env::var("LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("LOG_FORMAT") {
            self.logging.format = val;
        }

        // Cache and history overrides
        if let Ok(val) = env::var("CLAUDE_WATCH_CACHE_TTL") {
            self.cache.ttl_seconds = val.parse().context("Invalid CLAUDE_WATCH_CACHE_TTL")?;
        }
        if let Ok(val) = env::var("CLAUDE_WATCH_HISTORY_DAYS") {
            self.history.retention_days =
                val.parse().context("Invalid CLAUDE_WATCH_HISTORY_DAYS")?;
        }

        // Notification overrides
        if let Ok(val) = env::var("CLAUDE_WATCH_THRESHOLDS") {
            self.notifications.thresholds = val
                .split(',')
                .map(|t| t.trim().parse().context("Invalid CLAUDE_WATCH_THRESHOLDS"))
                .collect::<Result<Vec<u8>>>()?;
        }
        if let Ok(val) = env::var("CLAUDE_WATCH_RESET_FLOOR") {
            self.notifications.reset_floor =
                val.parse().context("Invalid CLAUDE_WATCH_RESET_FLOOR")?;
        }

        // API overrides
        if let Ok(val) = env::var("CLAUDE_WATCH_TIMEOUT") {
            self.api.timeout_seconds = val.parse().context("Invalid CLAUDE_WATCH_TIMEOUT")?;
        }

        // Path overrides
        if let Ok(val) = env::var("CLAUDE_WATCH_DATA_DIR") {
            self.paths.data_dir = PathBuf::from(val);
        }

        Ok(())
    }

    /// Validate configuration values. Invalid configuration is fatal at
    /// startup; nothing downstream is expected to re-check these.
    pub fn validate(&self) -> Result<()> {
        if self.cache.ttl_seconds == 0 {
            return Err(anyhow::anyhow!("Cache TTL must be greater than 0 seconds"));
        }

        if self.history.retention_days <= 0 {
            return Err(anyhow::anyhow!(
                "History retention must be greater than 0 days, got {}",
                self.history.retention_days
            ));
        }

        if self.notifications.thresholds.is_empty() {
            return Err(anyhow::anyhow!(
                "At least one notification threshold is required"
            ));
        }
        for window in self.notifications.thresholds.windows(2) {
            if window[1] <= window[0] {
                return Err(anyhow::anyhow!(
                    "Notification thresholds must be strictly ascending, got {:?}",
                    self.notifications.thresholds
                ));
            }
        }
        for &t in &self.notifications.thresholds {
            if t == 0 || t > 100 {
                return Err(anyhow::anyhow!(
                    "Notification thresholds must be between 1 and 100, got {}",
                    t
                ));
            }
        }

        let lowest = f64::from(self.notifications.thresholds[0]);
        if self.notifications.reset_floor < 0.0 || self.notifications.reset_floor >= lowest {
            return Err(anyhow::anyhow!(
                "Notification reset floor must be below the lowest threshold ({}), got {}",
                lowest,
                self.notifications.reset_floor
            ));
        }

        if self.analytics.peak_bucket_hours == 0 || 24 % self.analytics.peak_bucket_hours != 0 {
            return Err(anyhow::anyhow!(
                "Peak bucket hours must evenly divide 24, got {}",
                self.analytics.peak_bucket_hours
            ));
        }

        if self.api.timeout_seconds == 0 {
            return Err(anyhow::anyhow!("API timeout must be greater than 0 seconds"));
        }

        Ok(())
    }

    /// Location of the persisted snapshot cache.
    pub fn cache_file(&self) -> PathBuf {
        self.paths.data_dir.join(".usage_cache.json")
    }

    /// Location of the persisted usage history.
    pub fn history_file(&self) -> PathBuf {
        self.paths.data_dir.join(".usage_history.json")
    }

    /// Location of the persisted notification state.
    pub fn notify_state_file(&self) -> PathBuf {
        self.paths.data_dir.join(".notify_state.json")
    }
}
