//! Rate estimation and time-to-limit projection.
//!
//! Stateless over the current snapshot plus the history series. The short
//! (five-hour) window gets an hourly rate with a confidence band; the long
//! (seven-day) window gets a daily rate and an end-of-week projection.
//!
//! Rates are floored at a small epsilon rather than allowed to reach zero, so
//! divisions stay defined; a rate at the floor reports the "no limit
//! expected" sentinel (`None`) instead of an absurd finite horizon.

use crate::analytics::{get_period_stats, sample_stdev, values_in_window};
use crate::models::{ForecastResult, HistoryRecord, MetricField, UsageSnapshot};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Floor for both rates, in percentage points per hour/day.
pub const RATE_EPSILON: f64 = 0.01;

/// Trailing window for the short-term rate, in hours.
const SHORT_WINDOW_HOURS: i64 = 1;

/// Trailing window for the daily rate, in hours.
const LONG_WINDOW_HOURS: i64 = 24;

/// Minimum samples before the confidence band uses a measured stdev.
const MIN_BAND_SAMPLES: usize = 5;

/// Fixed band multipliers when too few samples exist for a stdev.
const CONSERVATIVE_FACTOR: f64 = 0.7;
const OPTIMISTIC_FACTOR: f64 = 1.5;

/// Daily-rate floor for the insufficient-samples fallback, so a quiet week
/// never projects a permanently-zero forecast.
const FALLBACK_MIN_DAILY_RATE: f64 = 0.1;

/// Project time-to-limit for both quota windows.
pub fn forecast(current: &UsageSnapshot, history: &[HistoryRecord]) -> ForecastResult {
    forecast_at(current, history, Utc::now())
}

pub fn forecast_at(
    current: &UsageSnapshot,
    history: &[HistoryRecord],
    now: DateTime<Utc>,
) -> ForecastResult {
    let (hourly_rate, hours_to_limit, conservative_hours, optimistic_hours) =
        short_window_projection(current, history, now);
    let (daily_rate, projected_week_end, days_to_limit) =
        long_window_projection(current, history, now);

    debug!(
        hourly_rate,
        daily_rate, projected_week_end, "Computed usage forecast"
    );

    ForecastResult {
        hourly_rate,
        hours_to_limit,
        conservative_hours,
        optimistic_hours,
        daily_rate,
        projected_week_end,
        days_to_limit,
    }
}

fn short_window_projection(
    current: &UsageSnapshot,
    history: &[HistoryRecord],
    now: DateTime<Utc>,
) -> (f64, Option<f64>, Option<f64>, Option<f64>) {
    let current_value = current.five_hour_pct();
    let remaining = (100.0 - current_value).max(0.0);

    let samples = values_in_window(history, SHORT_WINDOW_HOURS, MetricField::FiveHour, now);
    let raw_rate = if samples.len() >= 2 {
        let stats = get_period_stats(history, SHORT_WINDOW_HOURS, MetricField::FiveHour, now);
        stats.max - stats.min
    } else {
        // Too few observations: estimate from how much of the window was
        // consumed relative to the time left before it resets.
        reset_based_rate(current_value, current.five_hour_resets_at(), now)
    };

    let raw_rate = raw_rate.max(0.0);
    let hourly_rate = raw_rate.max(RATE_EPSILON);
    if raw_rate <= RATE_EPSILON {
        // No measurable consumption: no limit expected.
        return (hourly_rate, None, None, None);
    }

    let point = remaining / hourly_rate;
    let (conservative, optimistic) = if samples.len() >= MIN_BAND_SAMPLES {
        let stdev = sample_stdev(&samples);
        (
            remaining / (hourly_rate + stdev),
            remaining / (hourly_rate - stdev).max(RATE_EPSILON),
        )
    } else {
        (point * CONSERVATIVE_FACTOR, point * OPTIMISTIC_FACTOR)
    };

    (hourly_rate, Some(point), Some(conservative), Some(optimistic))
}

fn reset_based_rate(
    current_value: f64,
    resets_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> f64 {
    match resets_at {
        Some(resets_at) if resets_at > now => {
            let hours_until_reset = (resets_at - now).num_seconds() as f64 / 3600.0;
            current_value / hours_until_reset
        }
        _ => 0.0,
    }
}

fn long_window_projection(
    current: &UsageSnapshot,
    history: &[HistoryRecord],
    now: DateTime<Utc>,
) -> (f64, f64, Option<f64>) {
    let weekly_value = current.seven_day_pct();
    let stats = get_period_stats(history, LONG_WINDOW_HOURS, MetricField::SevenDay, now);

    let daily_rate = if stats.count >= 2 {
        (stats.max - stats.min).max(0.0)
    } else {
        (weekly_value / 7.0).max(FALLBACK_MIN_DAILY_RATE)
    };

    let days_remaining = current
        .seven_day_resets_at()
        .filter(|resets_at| *resets_at > now)
        .map(|resets_at| (resets_at - now).num_seconds() as f64 / 86_400.0)
        .unwrap_or(7.0);

    let projected_week_end = (weekly_value + daily_rate * days_remaining).min(100.0);
    let days_to_limit = if daily_rate > 0.0 {
        Some((100.0 - weekly_value).max(0.0) / daily_rate)
    } else {
        None
    };

    (daily_rate, projected_week_end, days_to_limit)
}
