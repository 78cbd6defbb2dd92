//! Output Formatting and Display Management
//!
//! Thin consumer over the telemetry core: colored terminal views for the
//! usage, forecast, and stats commands, plain single-line formats for shell
//! prompt embedding, and JSON output of the typed results for programmatic
//! consumption.
//!
//! This module never makes a decision; everything it prints is a typed
//! result computed upstream.

use crate::analytics::{busiest_bucket, PeakBucket};
use crate::cache::CachedSnapshot;
use crate::models::{ForecastResult, PeriodStats, TrendIndicator, UsageSnapshot};
use chrono::{DateTime, Utc};
use colored::Colorize;

/// Shell-prompt output variants, mirroring the `prompt --format` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PromptFormat {
    /// Session percentage with reset countdown: `S:45% 2h15m`
    Default,
    /// Just the percentage: `45%`
    Minimal,
    /// Session and weekly: `S:45% W:12%`
    Full,
}

/// Compact duration until a reset instant: `2h15m`, `45m`, or `<1m`.
pub fn format_reset_compact(resets_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let total_seconds = (resets_at - now).num_seconds().max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;

    if hours > 0 {
        format!("{}h{:02}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        "<1m".to_string()
    }
}

/// Single-line usage summary for shell prompts. Plain text; prompts apply
/// their own styling.
pub fn format_prompt(snapshot: &UsageSnapshot, format: PromptFormat) -> String {
    let session_pct = snapshot.five_hour_pct() as i64;
    match format {
        PromptFormat::Default => match snapshot.five_hour_resets_at() {
            Some(resets_at) => format!(
                "S:{}% {}",
                session_pct,
                format_reset_compact(resets_at, Utc::now())
            ),
            None => format!("S:{}%", session_pct),
        },
        PromptFormat::Minimal => format!("{}%", session_pct),
        PromptFormat::Full => format!(
            "S:{}% W:{}%",
            session_pct,
            snapshot.seven_day_pct() as i64
        ),
    }
}

pub struct DisplayManager;

impl Default for DisplayManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayManager {
    pub fn new() -> Self {
        Self
    }

    pub fn display_usage(
        &self,
        cached: &CachedSnapshot,
        trend: TrendIndicator,
        json_output: bool,
    ) {
        if json_output {
            let output = serde_json::json!({
                "data": cached.snapshot,
                "trend": trend,
                "stale": cached.stale,
            });
            match serde_json::to_string_pretty(&output) {
                Ok(json_str) => println!("{}", json_str),
                Err(e) => eprintln!("Error serializing usage to JSON: {}", e),
            }
            return;
        }

        let snapshot = &cached.snapshot;
        println!("\n{}", "Claude Usage".bright_white().bold());
        if cached.stale {
            println!("{}", "(stale reading, fetch failed)".yellow());
        }
        println!();

        let now = Utc::now();
        self.print_window_line("Session", snapshot.five_hour_pct(), Some(trend));
        if let Some(resets_at) = snapshot.five_hour_resets_at() {
            println!(
                "           resets in {}",
                format_reset_compact(resets_at, now).bright_white()
            );
        }

        self.print_window_line("Weekly ", snapshot.seven_day_pct(), None);
        if let Some(window) = &snapshot.seven_day_sonnet {
            self.print_window_line("Sonnet ", window.utilization, None);
        }
        if let Some(window) = &snapshot.seven_day_opus {
            self.print_window_line("Opus   ", window.utilization, None);
        }
        println!();
    }

    fn print_window_line(&self, label: &str, pct: f64, trend: Option<TrendIndicator>) {
        let arrow = match trend {
            Some(TrendIndicator::Up) => " ↑".red().to_string(),
            Some(TrendIndicator::Down) => " ↓".green().to_string(),
            Some(TrendIndicator::Stable) => " →".dimmed().to_string(),
            None => String::new(),
        };
        println!(
            "  {}  {} {}{}",
            label.bright_cyan(),
            progress_bar(pct, 25),
            colorize_pct(pct),
            arrow
        );
    }

    pub fn display_forecast(
        &self,
        snapshot: &UsageSnapshot,
        result: &ForecastResult,
        json_output: bool,
    ) {
        if json_output {
            match serde_json::to_string_pretty(result) {
                Ok(json_str) => println!("{}", json_str),
                Err(e) => eprintln!("Error serializing forecast to JSON: {}", e),
            }
            return;
        }

        println!("\n{}", "Usage Forecast".bright_white().bold());
        println!();
        println!(
            "  Session:  {} used, {} remaining",
            colorize_pct(snapshot.five_hour_pct()),
            format!("{:.0}%", 100.0 - snapshot.five_hour_pct()).green()
        );
        println!(
            "  Weekly:   {} used, {} remaining",
            colorize_pct(snapshot.seven_day_pct()),
            format!("{:.0}%", 100.0 - snapshot.seven_day_pct()).green()
        );
        println!();

        println!(
            "  Current rate:    {}",
            format!("{:.1}%/hour", result.hourly_rate).yellow()
        );
        match result.hours_to_limit {
            Some(hours) => {
                let colored_hours = if hours < 1.0 {
                    format!("{:.1}h", hours).red()
                } else if hours < 3.0 {
                    format!("{:.1}h", hours).yellow()
                } else {
                    format!("{:.1}h", hours).green()
                };
                print!("  Time to limit:   {}", colored_hours);
                if let (Some(conservative), Some(optimistic)) =
                    (result.conservative_hours, result.optimistic_hours)
                {
                    println!(" (range: {:.1}h - {:.1}h)", conservative, optimistic);
                } else {
                    println!();
                }
            }
            None => println!(
                "  Time to limit:   {}",
                "Not projected to hit limit".green()
            ),
        }

        println!();
        println!(
            "  Daily rate:      {}",
            format!("{:.1}%/day", result.daily_rate).yellow()
        );
        println!(
            "  Week projection: {}",
            colorize_pct(result.projected_week_end)
        );
        match result.days_to_limit {
            Some(days) => println!(
                "  Days to limit:   {}",
                format!("{:.1} days", days).yellow()
            ),
            None => println!("  Days to limit:   {}", "on track".green()),
        }
        println!();
    }

    pub fn display_stats(
        &self,
        stats_24h: &PeriodStats,
        stats_7d: &PeriodStats,
        peaks: &[PeakBucket],
        bucket_hours: u32,
        json_output: bool,
    ) {
        if json_output {
            let output = serde_json::json!({
                "last_24h": stats_24h,
                "last_7d": stats_7d,
                "peak_buckets": peaks,
            });
            match serde_json::to_string_pretty(&output) {
                Ok(json_str) => println!("{}", json_str),
                Err(e) => eprintln!("Error serializing stats to JSON: {}", e),
            }
            return;
        }

        println!("\n{}", "Usage Statistics".bright_white().bold());
        println!();
        self.print_stats_line("Last 24h", stats_24h);
        self.print_stats_line("Last 7d ", stats_7d);

        if let Some(peak) = busiest_bucket(peaks).filter(|p| p.samples > 0) {
            println!();
            println!("  Peak usage: {}", format_peak_line(peak, bucket_hours));
        }
        println!();
    }

    fn print_stats_line(&self, label: &str, stats: &PeriodStats) {
        if stats.count == 0 {
            println!("  {}  {}", label.bright_cyan(), "no data".dimmed());
            return;
        }
        println!(
            "  {}  min {} / avg {} / max {}  ({} samples)",
            label.bright_cyan(),
            colorize_pct(stats.min),
            colorize_pct(stats.avg),
            colorize_pct(stats.max),
            stats.count.to_string().bright_white()
        );
    }
}

fn progress_bar(pct: f64, width: usize) -> String {
    let filled = ((pct / 100.0) * width as f64).round() as usize;
    let filled = filled.min(width);
    let bar = format!("{}{}", "█".repeat(filled), "░".repeat(width - filled));
    if pct >= 90.0 {
        bar.red().to_string()
    } else if pct >= 75.0 {
        bar.yellow().to_string()
    } else {
        bar.green().to_string()
    }
}

fn format_peak_line(peak: &PeakBucket, bucket_hours: u32) -> String {
    format!(
        "{} {}:00-{}:00 (avg {})",
        peak.weekday_name().bright_cyan(),
        peak.start_hour,
        peak.start_hour + bucket_hours,
        colorize_pct(peak.avg)
    )
}

fn colorize_pct(pct: f64) -> colored::ColoredString {
    let text = format!("{:.0}%", pct);
    if pct >= 90.0 {
        text.red()
    } else if pct >= 75.0 {
        text.yellow()
    } else {
        text.green()
    }
}
