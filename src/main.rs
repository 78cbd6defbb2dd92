use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use claude_watch::analytics::{get_period_stats, peak_buckets};
use claude_watch::cache::{CacheManager, CachedSnapshot};
use claude_watch::client::{self, ApiClient};
use claude_watch::config::Config;
use claude_watch::display::{format_prompt, DisplayManager, PromptFormat};
use claude_watch::errors::FetchError;
use claude_watch::fetcher::{fetch_with_retry, RetryPolicy};
use claude_watch::forecast::forecast;
use claude_watch::history::HistoryStore;
use claude_watch::logging::init_logging;
use claude_watch::models::MetricField;
use claude_watch::notify::{LogSink, NotificationSink, NotificationStateMachine};
use claude_watch::trend::classify_trend;
use claude_watch::watch::{clamp_interval, run_watch};

#[derive(Parser)]
#[command(name = "claude-watch")]
#[command(about = "Track Claude subscription usage: cached readings, trends, forecasts, alerts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Use a mock reading instead of calling the API
    #[arg(long, global = true)]
    dry_run: bool,

    /// Override the cache TTL in seconds
    #[arg(long, global = true)]
    ttl: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show current usage with trend indicator (default)
    Usage {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
        /// Do not record this reading into usage history
        #[arg(long)]
        no_record: bool,
    },
    /// Project when usage will hit the quota limits
    Forecast {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Show windowed statistics and peak-usage patterns
    Stats {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Single-line output for shell prompt embedding
    Prompt {
        /// Output format
        #[arg(long, value_enum, default_value = "default")]
        format: PromptFormat,
    },
    /// Check alert thresholds and emit a notification on a new crossing
    Notify,
    /// Continuously refresh the usage view until interrupted
    Watch {
        /// Refresh interval in seconds (clamped to 10-300)
        #[arg(long, default_value_t = 30)]
        interval: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Invalid configuration is fatal before anything else runs.
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            process::exit(1);
        }
    };
    init_logging(&config.logging);

    match cli.command.unwrap_or(Commands::Usage {
        json: false,
        no_record: false,
    }) {
        Commands::Usage { json, no_record } => {
            match cmd_usage(&config, cli.ttl, cli.dry_run, json, no_record) {
                Ok(()) => Ok(()),
                Err(e) => handle_error(e, json),
            }
        }
        Commands::Forecast { json } => match cmd_forecast(&config, cli.ttl, cli.dry_run, json) {
            Ok(()) => Ok(()),
            Err(e) => handle_error(e, json),
        },
        Commands::Stats { json } => {
            cmd_stats(&config, json);
            Ok(())
        }
        Commands::Prompt { format } => {
            cmd_prompt(&config, cli.ttl, cli.dry_run, format);
            Ok(())
        }
        Commands::Notify => match cmd_notify(&config, cli.ttl, cli.dry_run) {
            Ok(exit_code) => process::exit(exit_code),
            Err(e) => handle_error(e, false),
        },
        Commands::Watch { interval } => {
            match cmd_watch(&config, cli.ttl, cli.dry_run, interval) {
                Ok(()) => Ok(()),
                Err(e) => handle_error(e, false),
            }
        }
    }
}

/// Fetch a snapshot through the cache, wiring up the configured fetcher.
fn fetch_cached(
    config: &Config,
    ttl_override: Option<u64>,
    dry_run: bool,
) -> Result<CachedSnapshot, FetchError> {
    let ttl = ttl_override.unwrap_or(config.cache.ttl_seconds);
    let cache = CacheManager::new(config.cache_file(), ttl);

    if dry_run {
        let fetcher = || Ok::<_, FetchError>(client::mock_snapshot());
        return cache.get(&fetcher);
    }

    let api = ApiClient::from_env(&config.api)?;
    let policy = RetryPolicy::with_max_retries(config.api.max_retries);
    let fetcher = || fetch_with_retry(&api, &policy);
    cache.get(&fetcher)
}

fn cmd_usage(
    config: &Config,
    ttl: Option<u64>,
    dry_run: bool,
    json: bool,
    no_record: bool,
) -> Result<(), anyhow::Error> {
    let cached = fetch_cached(config, ttl, dry_run)?;
    let history = HistoryStore::new(config.history_file(), config.history.retention_days);

    // Trend compares against the last recorded value, so classify before
    // this reading lands in history.
    let previous = history.latest().and_then(|record| record.five_hour);
    let trend = classify_trend(cached.snapshot.five_hour_pct(), previous);

    // Stale readings are re-served old data; recording them would duplicate
    // history entries.
    if !no_record && !cached.stale {
        history.record(&cached.snapshot)?;
    }

    DisplayManager::new().display_usage(&cached, trend, json);
    Ok(())
}

fn cmd_forecast(
    config: &Config,
    ttl: Option<u64>,
    dry_run: bool,
    json: bool,
) -> Result<(), anyhow::Error> {
    let cached = fetch_cached(config, ttl, dry_run)?;
    let history = HistoryStore::new(config.history_file(), config.history.retention_days);

    let result = forecast(&cached.snapshot, &history.load());
    DisplayManager::new().display_forecast(&cached.snapshot, &result, json);
    Ok(())
}

fn cmd_stats(config: &Config, json: bool) {
    let history = HistoryStore::new(config.history_file(), config.history.retention_days);
    let records = history.load();
    let now = chrono::Utc::now();

    let stats_24h = get_period_stats(&records, 24, MetricField::FiveHour, now);
    let stats_7d = get_period_stats(&records, 7 * 24, MetricField::SevenDay, now);
    let peaks = peak_buckets(
        &records,
        MetricField::FiveHour,
        config.analytics.peak_bucket_hours,
    );

    DisplayManager::new().display_stats(
        &stats_24h,
        &stats_7d,
        &peaks,
        config.analytics.peak_bucket_hours,
        json,
    );
}

/// Prompt output is the one silent-failure boundary: a broken fetch prints a
/// placeholder instead of an error so the shell prompt never breaks.
fn cmd_prompt(config: &Config, ttl: Option<u64>, dry_run: bool, format: PromptFormat) {
    match fetch_cached(config, ttl, dry_run) {
        Ok(cached) => println!("{}", format_prompt(&cached.snapshot, format)),
        Err(_) => println!("--"),
    }
}

fn cmd_notify(config: &Config, ttl: Option<u64>, dry_run: bool) -> Result<i32, anyhow::Error> {
    let cached = fetch_cached(config, ttl, dry_run)?;
    let machine = NotificationStateMachine::new(config.notify_state_file(), &config.notifications);

    match machine.check(&cached.snapshot)? {
        Some(event) => {
            LogSink.deliver(&event)?;
            // Exit codes let cron/systemd wrappers escalate: 2 critical,
            // 1 warning, 0 quiet.
            Ok(if event.threshold >= 90 { 2 } else { 1 })
        }
        None => Ok(0),
    }
}

fn cmd_watch(
    config: &Config,
    ttl: Option<u64>,
    dry_run: bool,
    interval: u64,
) -> Result<(), anyhow::Error> {
    let interval = Duration::from_secs(clamp_interval(interval));

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || handler_stop.store(true, Ordering::SeqCst))
        .context("Failed to install interrupt handler")?;

    let cache = CacheManager::new(config.cache_file(), ttl.unwrap_or(config.cache.ttl_seconds));
    let history = HistoryStore::new(config.history_file(), config.history.retention_days);

    if dry_run {
        let fetcher = || Ok::<_, FetchError>(client::mock_snapshot());
        return run_watch(&cache, &history, &fetcher, interval, &stop);
    }

    let api = ApiClient::from_env(&config.api)?;
    let policy = RetryPolicy::with_max_retries(config.api.max_retries);
    let fetcher = || fetch_with_retry(&api, &policy);
    run_watch(&cache, &history, &fetcher, interval, &stop)
}

fn handle_error(e: anyhow::Error, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::json!({ "error": e.to_string() }));
    } else {
        eprintln!("Error: {:#}", e);
    }
    process::exit(1);
}
