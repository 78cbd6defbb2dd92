//! Claude Watch Library
//!
//! Usage telemetry for Claude subscription quotas. The crate turns a raw
//! point-in-time usage reading into actionable signals: whether a cached
//! reading is fresh enough to reuse, how usage is trending, when a quota
//! limit will be reached, and whether an alert threshold has newly been
//! crossed.
//!
//! ## Architecture Overview
//!
//! The pipeline is organized leaf-first:
//!
//! - [`fetcher`] - The [`fetcher::UsageFetcher`] contract plus bounded-retry
//!   support; [`client`] provides the concrete HTTP implementation
//! - [`cache`] - TTL-bounded cache over the fetcher, persisted across
//!   invocations, with stale-reading fallback
//! - [`history`] - Append-only, retention-pruned usage time series
//! - [`analytics`] - Windowed statistics and peak-usage bucketing over the
//!   history series
//! - [`forecast`] - Rate estimation and time-to-limit projection
//! - [`trend`] - Three-state usage direction indicator
//! - [`notify`] - Threshold-crossing notification state machine and the
//!   [`notify::NotificationSink`] delivery contract
//!
//! Supporting modules: [`models`] for the shared data structures, [`config`]
//! for injected configuration, [`store`] for the defensive-read /
//! atomic-write persistence discipline shared by all three state files,
//! [`errors`] for the typed fetch failure taxonomy, [`logging`] for tracing
//! setup, and [`display`] for the thin terminal consumer.
//!
//! ## Cross-process model
//!
//! Multiple independent invocations (a shell prompt, a status-bar poller, a
//! watch loop) share the persisted cache, history, and notification state
//! with no locking. Every reader treats missing or corrupt files as safe
//! defaults and every writer goes through temp-file-then-rename, so a
//! concurrent reader never observes a half-written file.

pub mod analytics;
pub mod cache;
pub mod client;
pub mod config;
pub mod display;
pub mod errors;
pub mod fetcher;
pub mod forecast;
pub mod history;
pub mod logging;
pub mod models;
pub mod notify;
pub mod store;
pub mod trend;
pub mod watch;

pub use cache::{CacheManager, CachedSnapshot};
pub use config::Config;
pub use errors::FetchError;
pub use fetcher::{fetch_with_retry, RetryPolicy, UsageFetcher};
pub use history::HistoryStore;
pub use models::*;
pub use notify::{NotificationEvent, NotificationSink, NotificationStateMachine};
