//! Windowed statistics and peak-usage bucketing over the history series.
//!
//! Pure functions: all state comes in as arguments, including the reference
//! instant, so results are reproducible in tests.

use crate::models::{HistoryRecord, MetricField, PeriodStats};
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use serde::Serialize;

pub const WEEKDAY_NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Values of `field` from records inside the trailing window, oldest first.
pub fn values_in_window(
    history: &[HistoryRecord],
    window_hours: i64,
    field: MetricField,
    now: DateTime<Utc>,
) -> Vec<f64> {
    let cutoff = now - Duration::hours(window_hours);
    history
        .iter()
        .filter(|record| record.timestamp >= cutoff)
        .filter_map(|record| record.value(field))
        .collect()
}

/// Count/min/max/avg of `field` over the trailing window. Records outside the
/// window or with the field absent are ignored. An empty selection yields the
/// all-zero stats rather than an error, keeping consumers total.
pub fn get_period_stats(
    history: &[HistoryRecord],
    window_hours: i64,
    field: MetricField,
    now: DateTime<Utc>,
) -> PeriodStats {
    let values = values_in_window(history, window_hours, field, now);
    if values.is_empty() {
        return PeriodStats::default();
    }

    let count = values.len();
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let avg = values.iter().sum::<f64>() / count as f64;

    PeriodStats {
        count,
        min,
        max,
        avg,
    }
}

/// Sample standard deviation. Zero for fewer than two values.
pub fn sample_stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values
        .iter()
        .map(|v| (v - mean).powi(2))
        .sum::<f64>()
        / (values.len() - 1) as f64;
    variance.sqrt()
}

/// One cell of the day-of-week x hour-block peak grid.
#[derive(Debug, Clone, Serialize)]
pub struct PeakBucket {
    /// 0 = Monday .. 6 = Sunday (UTC).
    pub weekday: u8,
    /// First hour of the block (UTC).
    pub start_hour: u32,
    pub avg: f64,
    pub samples: usize,
}

impl PeakBucket {
    pub fn weekday_name(&self) -> &'static str {
        WEEKDAY_NAMES[self.weekday as usize]
    }
}

/// Average `field` per (UTC weekday x `bucket_hours`-wide hour block) bucket.
///
/// The grid is total and deterministic: all 7 x (24 / bucket_hours) buckets
/// are present in weekday-then-hour order, with empty buckets averaging 0.
/// Display-only; no core decision consumes this.
pub fn peak_buckets(
    history: &[HistoryRecord],
    field: MetricField,
    bucket_hours: u32,
) -> Vec<PeakBucket> {
    let blocks_per_day = (24 / bucket_hours) as usize;
    let mut sums = vec![0.0f64; 7 * blocks_per_day];
    let mut counts = vec![0usize; 7 * blocks_per_day];

    for record in history {
        let Some(value) = record.value(field) else {
            continue;
        };
        let weekday = record.timestamp.weekday().num_days_from_monday() as usize;
        let block = (record.timestamp.hour() / bucket_hours) as usize;
        let idx = weekday * blocks_per_day + block;
        sums[idx] += value;
        counts[idx] += 1;
    }

    (0..7 * blocks_per_day)
        .map(|idx| {
            let samples = counts[idx];
            PeakBucket {
                weekday: (idx / blocks_per_day) as u8,
                start_hour: (idx % blocks_per_day) as u32 * bucket_hours,
                avg: if samples > 0 {
                    sums[idx] / samples as f64
                } else {
                    0.0
                },
                samples,
            }
        })
        .collect()
}

/// The bucket with the highest average, ties broken by grid order.
pub fn busiest_bucket(buckets: &[PeakBucket]) -> Option<&PeakBucket> {
    buckets
        .iter()
        .max_by(|a, b| a.avg.partial_cmp(&b.avg).unwrap_or(std::cmp::Ordering::Equal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(timestamp: DateTime<Utc>, five_hour: Option<f64>) -> HistoryRecord {
        HistoryRecord {
            timestamp,
            five_hour,
            seven_day: None,
            seven_day_sonnet: None,
            seven_day_opus: None,
        }
    }

    #[test]
    fn test_empty_history_yields_zero_stats() {
        let stats = get_period_stats(&[], 24, MetricField::FiveHour, Utc::now());
        assert_eq!(stats.count, 0);
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 0.0);
        assert_eq!(stats.avg, 0.0);
    }

    #[test]
    fn test_stats_respect_window_and_field_presence() {
        let now = Utc::now();
        let history = vec![
            record(now - Duration::hours(30), Some(90.0)), // outside window
            record(now - Duration::hours(2), Some(20.0)),
            record(now - Duration::hours(1), None), // field absent
            record(now - Duration::minutes(10), Some(40.0)),
        ];

        let stats = get_period_stats(&history, 24, MetricField::FiveHour, now);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.min, 20.0);
        assert_eq!(stats.max, 40.0);
        assert_eq!(stats.avg, 30.0);
    }

    #[test]
    fn test_sample_stdev() {
        assert_eq!(sample_stdev(&[]), 0.0);
        assert_eq!(sample_stdev(&[5.0]), 0.0);
        // Known value: stdev of 2,4,4,4,5,5,7,9 is 2.138 (sample).
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((sample_stdev(&values) - 2.138).abs() < 0.001);
    }

    #[test]
    fn test_peak_grid_is_total_and_deterministic() {
        let buckets = peak_buckets(&[], MetricField::FiveHour, 4);
        assert_eq!(buckets.len(), 7 * 6);
        assert!(buckets.iter().all(|b| b.avg == 0.0 && b.samples == 0));
        assert_eq!(buckets[0].weekday, 0);
        assert_eq!(buckets[0].start_hour, 0);
        assert_eq!(buckets[41].weekday, 6);
        assert_eq!(buckets[41].start_hour, 20);
    }

    #[test]
    fn test_peak_buckets_average_per_cell() {
        // 2026-01-05 is a Monday.
        let monday_morning = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let history = vec![
            record(monday_morning, Some(40.0)),
            record(monday_morning + Duration::hours(1), Some(60.0)),
            record(monday_morning + Duration::days(1), Some(10.0)),
        ];

        let buckets = peak_buckets(&history, MetricField::FiveHour, 4);
        // Hours 9 and 10 land in Monday's 8-12 block.
        let monday_block = buckets
            .iter()
            .find(|b| b.weekday == 0 && b.start_hour == 8)
            .unwrap();
        assert_eq!(monday_block.samples, 2);
        assert_eq!(monday_block.avg, 50.0);

        let busiest = busiest_bucket(&buckets).unwrap();
        assert_eq!(busiest.weekday, 0);
        assert_eq!(busiest.start_hour, 8);
        assert_eq!(busiest.weekday_name(), "Mon");
    }
}
