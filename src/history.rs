//! Append-only usage history with retention pruning.
//!
//! The persisted file is an array of flattened [`HistoryRecord`]s, always
//! sorted ascending by timestamp. Every write prunes records older than the
//! retention horizon. Appends are unconditional; callers that want to skip
//! recording a read (e.g. `--no-record`) simply do not call [`record`].
//!
//! [`record`]: HistoryStore::record

use crate::models::{HistoryRecord, UsageSnapshot};
use crate::store;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;
use tracing::debug;

pub struct HistoryStore {
    path: PathBuf,
    retention_days: i64,
}

impl HistoryStore {
    pub fn new(path: PathBuf, retention_days: i64) -> Self {
        Self {
            path,
            retention_days,
        }
    }

    /// Load the full series. Missing or corrupt files read as empty.
    pub fn load(&self) -> Vec<HistoryRecord> {
        store::load_json(&self.path).unwrap_or_default()
    }

    /// The most recent record, used by the trend classifier.
    pub fn latest(&self) -> Option<HistoryRecord> {
        self.load().into_iter().last()
    }

    /// Append a flattened record for this snapshot, prune past the retention
    /// horizon, and persist the sorted series.
    pub fn record(&self, snapshot: &UsageSnapshot) -> Result<()> {
        self.record_at(snapshot, Utc::now())
    }

    pub(crate) fn record_at(&self, snapshot: &UsageSnapshot, now: DateTime<Utc>) -> Result<()> {
        let mut history = self.load();
        history.push(HistoryRecord::from_snapshot(snapshot, now));

        let cutoff = now - Duration::days(self.retention_days);
        let before = history.len();
        history.retain(|record| record.timestamp >= cutoff);

        history.sort_by_key(|record| record.timestamp);
        store::save_json_atomic(&self.path, &history)?;

        debug!(
            records = history.len(),
            pruned = before - history.len(),
            "Recorded usage history entry"
        );
        Ok(())
    }
}
