//! Interactive watch loop with live refresh and delta tracking.
//!
//! Polls through the shared cache on a fixed interval, records fresh readings
//! into history, and redraws the usage view with a header showing refresh
//! count, session duration, and the change since the loop started. An
//! interrupt lands between cycles, never mid-write, and prints a session
//! summary on the way out.

use crate::cache::CacheManager;
use crate::display::DisplayManager;
use crate::fetcher::UsageFetcher;
use crate::history::HistoryStore;
use crate::models::UsageSnapshot;
use crate::trend::classify_trend;
use anyhow::Result;
use colored::Colorize;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::warn;

pub const MIN_INTERVAL_SECS: u64 = 10;
pub const MAX_INTERVAL_SECS: u64 = 300;

/// Clamp a requested refresh interval into the supported range.
pub fn clamp_interval(seconds: u64) -> u64 {
    seconds.clamp(MIN_INTERVAL_SECS, MAX_INTERVAL_SECS)
}

/// Refresh until `stop` is raised, then print a session summary.
///
/// Fetch errors are shown and the loop keeps going; transient outages are
/// expected over a long watch session.
pub fn run_watch(
    cache: &CacheManager,
    history: &HistoryStore,
    fetcher: &dyn UsageFetcher,
    interval: Duration,
    stop: &AtomicBool,
) -> Result<()> {
    let display = DisplayManager::new();
    let started = Instant::now();
    let mut refreshes: u32 = 0;
    let mut initial: Option<UsageSnapshot> = None;
    let mut last: Option<UsageSnapshot> = None;

    while !stop.load(Ordering::SeqCst) {
        match cache.get(fetcher) {
            Ok(cached) => {
                refreshes += 1;
                let previous = last
                    .as_ref()
                    .map(|snapshot| snapshot.five_hour_pct())
                    .or_else(|| history.latest().and_then(|record| record.five_hour));
                let trend = classify_trend(cached.snapshot.five_hour_pct(), previous);

                if !cached.stale {
                    if let Err(e) = history.record(&cached.snapshot) {
                        warn!(error = %e, "Failed to record reading during watch");
                    }
                }

                let delta = initial
                    .as_ref()
                    .and_then(|first| usage_delta(first, &cached.snapshot));
                clear_screen();
                print_header(interval, refreshes, started.elapsed(), delta);
                display.display_usage(&cached, trend, false);

                if initial.is_none() {
                    initial = Some(cached.snapshot.clone());
                }
                last = Some(cached.snapshot);
            }
            Err(e) => {
                clear_screen();
                println!("{}", format!("Error fetching usage: {}", e).red());
            }
        }
        sleep_between_cycles(interval, stop);
    }

    clear_screen();
    print_summary(started.elapsed(), refreshes, initial.as_ref(), last.as_ref());
    Ok(())
}

/// Session utilization change between two readings, when both carry the
/// five-hour window.
fn usage_delta(initial: &UsageSnapshot, current: &UsageSnapshot) -> Option<f64> {
    let first = initial.five_hour.as_ref()?.utilization;
    let now = current.five_hour.as_ref()?.utilization;
    Some(now - first)
}

fn format_delta(delta: f64) -> String {
    if delta > 0.0 {
        format!("+{:.1}%", delta).red().to_string()
    } else if delta < 0.0 {
        format!("{:.1}%", delta).green().to_string()
    } else {
        "±0.0%".dimmed().to_string()
    }
}

fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 || hours > 0 {
        parts.push(format!("{}m", minutes));
    }
    parts.push(format!("{}s", secs));
    parts.join(" ")
}

fn print_header(interval: Duration, refreshes: u32, session: Duration, delta: Option<f64>) {
    let mut parts = vec![
        "Claude Watch".bright_cyan().bold().to_string(),
        format!("Interval: {}s", interval.as_secs()),
        format!("Refreshes: {}", refreshes),
        format!("Session: {}", format_duration(session.as_secs())),
    ];
    if let Some(delta) = delta {
        parts.push(format!("Delta: {}", format_delta(delta)));
    }
    parts.push(
        chrono::Local::now()
            .format("%H:%M:%S")
            .to_string()
            .dimmed()
            .to_string(),
    );
    println!("{}", parts.join(" | "));
    println!("{}", "─".repeat(60).dimmed());
}

fn print_summary(
    session: Duration,
    refreshes: u32,
    initial: Option<&UsageSnapshot>,
    last: Option<&UsageSnapshot>,
) {
    println!();
    println!("{}", "Watch Session Summary".bright_cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("Duration: {}", format_duration(session.as_secs()));
    println!("Refreshes: {}", refreshes);
    if let (Some(initial), Some(last)) = (initial, last) {
        if let Some(delta) = usage_delta(initial, last) {
            println!("Usage change: {}", format_delta(delta));
        }
    }
    println!();
}

fn clear_screen() {
    print!("\x1b[2J\x1b[H");
    let _ = io::stdout().flush();
}

// Sleep in short slices so an interrupt takes effect between cycles instead
// of waiting out the full interval.
fn sleep_between_cycles(interval: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + interval;
    while !stop.load(Ordering::SeqCst) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        std::thread::sleep(remaining.min(Duration::from_millis(200)));
    }
}
