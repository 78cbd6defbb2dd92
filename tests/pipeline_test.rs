//! Cross-component integration tests: the full telemetry pipeline over a
//! temporary data directory, exercising cache, history, analytics, forecast,
//! trend, and notification state together the way the CLI wires them up.

use chrono::{Duration, Utc};
use std::cell::Cell;
use tempfile::tempdir;

use claude_watch::analytics::{get_period_stats, peak_buckets};
use claude_watch::cache::CacheManager;
use claude_watch::config::NotificationConfig;
use claude_watch::errors::FetchError;
use claude_watch::forecast::forecast;
use claude_watch::history::HistoryStore;
use claude_watch::models::{MetricField, TrendIndicator, UsageSnapshot, UsageWindow};
use claude_watch::notify::NotificationStateMachine;
use claude_watch::trend::classify_trend;
use claude_watch::UsageFetcher;

fn snapshot(five_hour: f64, seven_day: f64) -> UsageSnapshot {
    UsageSnapshot {
        timestamp: Utc::now(),
        five_hour: Some(UsageWindow {
            utilization: five_hour,
            resets_at: Some(Utc::now() + Duration::hours(3)),
        }),
        seven_day: Some(UsageWindow {
            utilization: seven_day,
            resets_at: Some(Utc::now() + Duration::days(4)),
        }),
        seven_day_sonnet: None,
        seven_day_opus: None,
        extra_usage: None,
    }
}

struct SequenceFetcher {
    calls: Cell<usize>,
    readings: Vec<(f64, f64)>,
}

impl SequenceFetcher {
    fn new(readings: Vec<(f64, f64)>) -> Self {
        Self {
            calls: Cell::new(0),
            readings,
        }
    }
}

impl UsageFetcher for SequenceFetcher {
    fn fetch_usage(&self) -> Result<UsageSnapshot, FetchError> {
        let idx = self.calls.get().min(self.readings.len() - 1);
        self.calls.set(self.calls.get() + 1);
        let (five_hour, seven_day) = self.readings[idx];
        Ok(snapshot(five_hour, seven_day))
    }
}

#[test]
fn cache_deduplicates_fetches_within_ttl() {
    let dir = tempdir().unwrap();
    let cache = CacheManager::new(dir.path().join("cache.json"), 60);
    let fetcher = SequenceFetcher::new(vec![(10.0, 5.0), (20.0, 6.0)]);

    let first = cache.get(&fetcher).unwrap();
    let second = cache.get(&fetcher).unwrap();

    // Both reads came from one fetch.
    assert_eq!(fetcher.calls.get(), 1);
    assert_eq!(first.snapshot.five_hour_pct(), 10.0);
    assert_eq!(second.snapshot.five_hour_pct(), 10.0);
    assert!(!second.stale);
}

#[test]
fn recorded_readings_feed_stats_and_forecast() {
    let dir = tempdir().unwrap();
    let history = HistoryStore::new(dir.path().join("history.json"), 180);

    // A session ramping up over the last hour.
    let levels = [30.0, 33.0, 36.0, 39.0, 42.0, 45.0];
    for &level in &levels {
        history.record(&snapshot(level, 12.0)).unwrap();
    }

    let records = history.load();
    assert_eq!(records.len(), levels.len());

    let now = Utc::now();
    let stats = get_period_stats(&records, 1, MetricField::FiveHour, now);
    assert_eq!(stats.count, 6);
    assert_eq!(stats.min, 30.0);
    assert_eq!(stats.max, 45.0);

    let current = snapshot(45.0, 12.0);
    let result = forecast(&current, &records);
    assert!((result.hourly_rate - 15.0).abs() < 1e-9);
    let hours = result.hours_to_limit.expect("ramping usage projects a limit");
    assert!((hours - 55.0 / 15.0).abs() < 1e-9);

    // Six samples: the confidence band brackets the point estimate.
    assert!(result.conservative_hours.unwrap() <= hours);
    assert!(result.optimistic_hours.unwrap() >= hours);

    let peaks = peak_buckets(&records, MetricField::FiveHour, 4);
    assert_eq!(peaks.len(), 42);
    assert_eq!(peaks.iter().map(|b| b.samples).sum::<usize>(), 6);
}

#[test]
fn trend_tracks_last_recorded_value() {
    let dir = tempdir().unwrap();
    let history = HistoryStore::new(dir.path().join("history.json"), 180);

    history.record(&snapshot(40.0, 10.0)).unwrap();
    let previous = history.latest().and_then(|r| r.five_hour);

    assert_eq!(classify_trend(46.0, previous), TrendIndicator::Up);
    assert_eq!(classify_trend(42.0, previous), TrendIndicator::Stable);
    // A quota reset shows as a large negative jump.
    assert_eq!(classify_trend(2.0, previous), TrendIndicator::Down);
}

#[test]
fn notification_machine_survives_process_boundaries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("notify.json");
    let config = NotificationConfig::default();

    // Each reading is handled by a fresh machine, as separate invocations
    // sharing only the state file would.
    let readings = [70.0, 82.0, 91.0, 96.0, 40.0];
    let mut fired = Vec::new();
    for &usage in &readings {
        let machine = NotificationStateMachine::new(path.clone(), &config);
        if let Some(event) = machine.check(&snapshot(usage, 0.0)).unwrap() {
            fired.push(event.threshold);
        }
    }

    assert_eq!(fired, vec![80, 90, 95]);
    let machine = NotificationStateMachine::new(path, &config);
    assert_eq!(machine.state().last_threshold, 0);
}

#[test]
fn stale_cache_serves_last_reading_when_fetch_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cache.json");

    // First invocation succeeds and persists.
    let cache = CacheManager::new(path.clone(), 1);
    let ok_fetcher = SequenceFetcher::new(vec![(55.0, 20.0)]);
    cache.get(&ok_fetcher).unwrap();

    // A later invocation finds the entry expired and the network down.
    std::thread::sleep(std::time::Duration::from_millis(1100));
    let fetcher = || -> Result<UsageSnapshot, FetchError> {
        Err(FetchError::Network("offline".into()))
    };
    let result = CacheManager::new(path, 1).get(&fetcher).unwrap();
    assert!(result.stale);
    assert_eq!(result.snapshot.five_hour_pct(), 55.0);
}

#[test]
fn empty_state_yields_total_results_everywhere() {
    let dir = tempdir().unwrap();
    let history = HistoryStore::new(dir.path().join("history.json"), 180);
    let records = history.load();
    assert!(records.is_empty());

    let stats = get_period_stats(&records, 24, MetricField::SevenDay, Utc::now());
    assert_eq!(stats.count, 0);
    assert_eq!(stats.avg, 0.0);

    // Empty history, 34% used, resets in 3h25m: reset-based fallback keeps
    // the projection finite.
    let mut current = snapshot(34.0, 0.0);
    current.five_hour.as_mut().unwrap().resets_at =
        Some(Utc::now() + Duration::hours(3) + Duration::minutes(25));
    let result = forecast(&current, &records);
    assert!(result.hourly_rate > 0.0);
    assert!(result.hours_to_limit.unwrap().is_finite());
}
