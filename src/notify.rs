//! Threshold-crossing notification state machine.
//!
//! Tracks which alert thresholds have already fired across invocations so
//! that repeated polling with the same reading notifies at most once. The
//! machine owns the persisted [`NotificationState`] file; delivery itself
//! goes through the [`NotificationSink`] contract and is out of scope here.

use crate::config::NotificationConfig;
use crate::models::{NotificationState, UsageSnapshot};
use crate::store;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;
use tracing::{debug, info};

/// Emitted when usage first reaches a threshold not yet notified for.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub threshold: u8,
    pub current_usage: f64,
    /// Time until the five-hour window resets, when the snapshot carries it.
    pub time_to_reset: Option<Duration>,
}

/// Delivery contract for threshold events. Desktop notifications, webhooks,
/// or plain logging all sit behind this seam.
pub trait NotificationSink {
    fn deliver(&self, event: &NotificationEvent) -> Result<()>;
}

pub struct NotificationStateMachine {
    path: PathBuf,
    thresholds: Vec<u8>,
    reset_floor: f64,
}

impl NotificationStateMachine {
    pub fn new(path: PathBuf, config: &NotificationConfig) -> Self {
        Self {
            path,
            thresholds: config.thresholds.clone(),
            reset_floor: config.reset_floor,
        }
    }

    /// Advance the machine with the current reading. Returns the single new
    /// crossing event, if any. State is persisted after any mutation.
    ///
    /// The reading is the worse of the two quota windows, so either window
    /// approaching its limit raises the alert.
    pub fn check(&self, snapshot: &UsageSnapshot) -> Result<Option<NotificationEvent>> {
        self.check_at(snapshot, Utc::now())
    }

    pub(crate) fn check_at(
        &self,
        snapshot: &UsageSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Option<NotificationEvent>> {
        let usage = snapshot.five_hour_pct().max(snapshot.seven_day_pct());
        let mut state: NotificationState = store::load_json(&self.path).unwrap_or_default();
        let mut dirty = false;

        // Crossing rule: the largest threshold now reached but not yet
        // notified for. Lower thresholds skipped over fire nothing.
        let crossed = self
            .thresholds
            .iter()
            .copied()
            .filter(|&t| f64::from(t) <= usage && t > state.last_threshold)
            .max();

        let event = crossed.map(|threshold| {
            state.last_threshold = threshold;
            state.last_notified = Some(now);
            dirty = true;
            info!(threshold, usage, "Usage threshold crossed");
            NotificationEvent {
                threshold,
                current_usage: usage,
                time_to_reset: snapshot
                    .five_hour_resets_at()
                    .filter(|resets_at| *resets_at > now)
                    .map(|resets_at| resets_at - now),
            }
        });

        // Reset rule, evaluated after crossing: usage back below the floor
        // clears the fired state so the next climb notifies again. The floor
        // sits below the lowest threshold, so a reset and a crossing can
        // never be observed from the same reading.
        if usage < self.reset_floor && state.last_threshold > 0 {
            debug!(
                usage,
                reset_floor = self.reset_floor,
                "Usage dropped below reset floor, clearing notification state"
            );
            state.last_threshold = 0;
            dirty = true;
        }

        if dirty {
            store::save_json_atomic(&self.path, &state)?;
        }
        Ok(event)
    }

    /// Current persisted state; defaults for missing or corrupt files.
    pub fn state(&self) -> NotificationState {
        store::load_json(&self.path).unwrap_or_default()
    }
}

/// Sink that reports events through the log stream. The default delivery
/// when no external integration is wired up.
pub struct LogSink;

impl NotificationSink for LogSink {
    fn deliver(&self, event: &NotificationEvent) -> Result<()> {
        info!(
            threshold = event.threshold,
            usage = event.current_usage,
            "Usage alert delivered"
        );
        Ok(())
    }
}
