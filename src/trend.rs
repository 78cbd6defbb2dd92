//! Three-state trend classification against the last recorded value.

use crate::models::TrendIndicator;

/// Hysteresis band in percentage points. Deltas within +-5 classify as
/// stable so noisy small readings do not flap between states.
pub const TREND_BAND: f64 = 5.0;

/// Compare the current value against the most recent history value for the
/// same field. A large negative jump signals a quota reset, reported as
/// `Down`. Missing previous value gives no signal.
pub fn classify_trend(current: f64, previous: Option<f64>) -> TrendIndicator {
    let Some(previous) = previous else {
        return TrendIndicator::Stable;
    };

    let delta = current - previous;
    if delta > TREND_BAND {
        TrendIndicator::Up
    } else if delta < -TREND_BAND {
        TrendIndicator::Down
    } else {
        TrendIndicator::Stable
    }
}
