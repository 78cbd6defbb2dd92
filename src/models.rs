//! Core Data Models
//!
//! This module defines the data structures flowing through the usage telemetry
//! pipeline, from the raw API reading to the derived analytics results.
//!
//! ## Data Flow
//!
//! 1. **Raw Reading**: [`UsageSnapshot`] - A point-in-time reading from the usage API
//! 2. **Persistence**: [`CacheEntry`], [`HistoryRecord`], [`NotificationState`] -
//!    the three file-backed state objects shared across invocations
//! 3. **Derived Results**: [`PeriodStats`], [`ForecastResult`], [`TrendIndicator`] -
//!    pure outputs of the analytics and forecast engines
//!
//! ## Features
//!
//! - **Serde Integration**: All persisted and reportable types serialize to JSON
//! - **Optional Fields**: Absent quota windows and reset timestamps are modeled
//!   explicitly rather than defaulted away
//! - **Total Results**: Stats and forecasts are fully-defined even with no data

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One quota window as reported by the API: percent consumed plus the instant
/// the window's counter returns to zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageWindow {
    #[serde(default)]
    pub utilization: f64,
    #[serde(default)]
    pub resets_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraUsage {
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default)]
    pub credits: Option<f64>,
}

/// A point-in-time usage reading. Immutable once produced by the fetcher.
///
/// The wire payload carries no timestamp of its own, so `timestamp` defaults
/// to the moment of deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSnapshot {
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub five_hour: Option<UsageWindow>,
    #[serde(default)]
    pub seven_day: Option<UsageWindow>,
    #[serde(default)]
    pub seven_day_sonnet: Option<UsageWindow>,
    #[serde(default)]
    pub seven_day_opus: Option<UsageWindow>,
    #[serde(default)]
    pub extra_usage: Option<ExtraUsage>,
}

impl UsageSnapshot {
    /// Session (five-hour window) utilization, 0 when the window is absent.
    pub fn five_hour_pct(&self) -> f64 {
        self.five_hour.as_ref().map_or(0.0, |w| w.utilization)
    }

    /// Weekly (seven-day window) utilization, 0 when the window is absent.
    pub fn seven_day_pct(&self) -> f64 {
        self.seven_day.as_ref().map_or(0.0, |w| w.utilization)
    }

    pub fn five_hour_resets_at(&self) -> Option<DateTime<Utc>> {
        self.five_hour.as_ref().and_then(|w| w.resets_at)
    }

    pub fn seven_day_resets_at(&self) -> Option<DateTime<Utc>> {
        self.seven_day.as_ref().and_then(|w| w.resets_at)
    }
}

/// The single persisted cache slot: one snapshot plus when it was taken.
/// Overwritten on every refresh, never appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub cached_at: DateTime<Utc>,
    pub data: UsageSnapshot,
}

/// One flattened row of the usage history time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub five_hour: Option<f64>,
    #[serde(default)]
    pub seven_day: Option<f64>,
    #[serde(default)]
    pub seven_day_sonnet: Option<f64>,
    #[serde(default)]
    pub seven_day_opus: Option<f64>,
}

impl HistoryRecord {
    /// Build a record from a snapshot, flattening each window to its
    /// utilization percentage.
    pub fn from_snapshot(snapshot: &UsageSnapshot, timestamp: DateTime<Utc>) -> Self {
        let pct = |w: &Option<UsageWindow>| w.as_ref().map(|w| w.utilization);
        Self {
            timestamp,
            five_hour: pct(&snapshot.five_hour),
            seven_day: pct(&snapshot.seven_day),
            seven_day_sonnet: pct(&snapshot.seven_day_sonnet),
            seven_day_opus: pct(&snapshot.seven_day_opus),
        }
    }

    pub fn value(&self, field: MetricField) -> Option<f64> {
        match field {
            MetricField::FiveHour => self.five_hour,
            MetricField::SevenDay => self.seven_day,
            MetricField::SevenDaySonnet => self.seven_day_sonnet,
            MetricField::SevenDayOpus => self.seven_day_opus,
        }
    }
}

/// Selects one history column for analytics queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricField {
    FiveHour,
    SevenDay,
    SevenDaySonnet,
    SevenDayOpus,
}

impl MetricField {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricField::FiveHour => "five_hour",
            MetricField::SevenDay => "seven_day",
            MetricField::SevenDaySonnet => "seven_day_sonnet",
            MetricField::SevenDayOpus => "seven_day_opus",
        }
    }
}

/// Windowed statistics over one history column.
///
/// `count == 0` is the well-defined "no data" result: min/max/avg report 0 so
/// consumers stay total functions.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PeriodStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

/// Rate estimates and time-to-limit projections for both quota windows.
///
/// `hours_to_limit == None` is the "no limit expected" sentinel: the measured
/// rate sat at its epsilon floor, so no finite projection is meaningful.
/// `days_to_limit == None` means the weekly window is on track.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastResult {
    pub hourly_rate: f64,
    pub hours_to_limit: Option<f64>,
    pub conservative_hours: Option<f64>,
    pub optimistic_hours: Option<f64>,
    pub daily_rate: f64,
    pub projected_week_end: f64,
    pub days_to_limit: Option<f64>,
}

/// Three-state usage direction indicator. Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendIndicator {
    Up,
    Down,
    Stable,
}

/// Persisted notification bookkeeping: the highest threshold already fired
/// and when. `last_threshold` is monotonically non-decreasing except on reset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationState {
    #[serde(default)]
    pub last_threshold: u8,
    #[serde(default)]
    pub last_notified: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_accessors_with_absent_windows() {
        let snapshot: UsageSnapshot = serde_json::from_str("{}").unwrap();
        assert_eq!(snapshot.five_hour_pct(), 0.0);
        assert_eq!(snapshot.seven_day_pct(), 0.0);
        assert!(snapshot.five_hour_resets_at().is_none());
    }

    #[test]
    fn test_snapshot_deserializes_api_payload() {
        let json = r#"{
            "five_hour": {"utilization": 34.5, "resets_at": "2026-01-05T12:00:00Z"},
            "seven_day": {"utilization": 12.3, "resets_at": "2026-01-09T00:00:00Z"},
            "seven_day_sonnet": {"utilization": 8.1},
            "seven_day_opus": null,
            "extra_usage": {"is_enabled": false}
        }"#;
        let snapshot: UsageSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.five_hour_pct(), 34.5);
        assert_eq!(snapshot.seven_day_pct(), 12.3);
        assert!(snapshot.seven_day_opus.is_none());
        assert!(!snapshot.extra_usage.unwrap().is_enabled);
    }

    #[test]
    fn test_history_record_flattens_snapshot() {
        let json = r#"{"five_hour": {"utilization": 40.0}, "seven_day": {"utilization": 10.0}}"#;
        let snapshot: UsageSnapshot = serde_json::from_str(json).unwrap();
        let record = HistoryRecord::from_snapshot(&snapshot, Utc::now());
        assert_eq!(record.value(MetricField::FiveHour), Some(40.0));
        assert_eq!(record.value(MetricField::SevenDay), Some(10.0));
        assert_eq!(record.value(MetricField::SevenDayOpus), None);
    }
}
