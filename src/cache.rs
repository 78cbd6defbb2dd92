//! Freshness-bounded cache over the usage fetcher.
//!
//! One persisted [`CacheEntry`] at a time, overwritten on refresh. Within the
//! TTL the fetcher is never invoked; past it the cache refreshes and falls
//! back to the stale entry when the fetch fails for a recoverable reason.
//! Authentication failures are never masked by stale data.

use crate::errors::FetchError;
use crate::fetcher::UsageFetcher;
use crate::models::{CacheEntry, UsageSnapshot};
use crate::store;
use chrono::{DateTime, Duration, Utc};
use std::path::PathBuf;
use tracing::{debug, warn};

/// A snapshot as served by the cache. `stale` marks a reading older than the
/// TTL that was returned because a fresh fetch failed; callers may surface it.
#[derive(Debug, Clone)]
pub struct CachedSnapshot {
    pub snapshot: UsageSnapshot,
    pub stale: bool,
}

pub struct CacheManager {
    path: PathBuf,
    ttl: Duration,
}

impl CacheManager {
    pub fn new(path: PathBuf, ttl_seconds: u64) -> Self {
        Self {
            path,
            ttl: Duration::seconds(ttl_seconds as i64),
        }
    }

    /// Return a snapshot, consulting the fetcher only when the persisted
    /// entry is missing, unreadable, or older than the TTL.
    pub fn get(&self, fetcher: &dyn UsageFetcher) -> Result<CachedSnapshot, FetchError> {
        self.get_at(fetcher, Utc::now())
    }

    fn get_at(
        &self,
        fetcher: &dyn UsageFetcher,
        now: DateTime<Utc>,
    ) -> Result<CachedSnapshot, FetchError> {
        let entry: Option<CacheEntry> = store::load_json(&self.path);

        if let Some(ref entry) = entry {
            if is_fresh(entry, self.ttl, now) {
                debug!(
                    age_secs = (now - entry.cached_at).num_seconds(),
                    "Cache hit"
                );
                return Ok(CachedSnapshot {
                    snapshot: entry.data.clone(),
                    stale: false,
                });
            }
        }

        match fetcher.fetch_usage() {
            Ok(snapshot) => {
                let fresh = CacheEntry {
                    cached_at: now,
                    data: snapshot.clone(),
                };
                // A failed cache write degrades the next invocation but not
                // this one.
                if let Err(e) = store::save_json_atomic(&self.path, &fresh) {
                    warn!(error = %e, "Failed to persist cache entry");
                }
                Ok(CachedSnapshot {
                    snapshot,
                    stale: false,
                })
            }
            Err(e) if e.is_auth() => Err(e),
            Err(e) => match entry {
                Some(entry) => {
                    warn!(error = %e, "Fetch failed, serving stale cache entry");
                    Ok(CachedSnapshot {
                        snapshot: entry.data,
                        stale: true,
                    })
                }
                None => Err(e),
            },
        }
    }

    /// Drop the persisted entry so the next `get` must fetch.
    pub fn invalidate(&self) -> anyhow::Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

fn is_fresh(entry: &CacheEntry, ttl: Duration, now: DateTime<Utc>) -> bool {
    now - entry.cached_at < ttl
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::save_json_atomic;
    use std::cell::Cell;
    use tempfile::tempdir;

    fn snapshot_with_five_hour(pct: f64) -> UsageSnapshot {
        serde_json::from_str(&format!(r#"{{"five_hour": {{"utilization": {}}}}}"#, pct)).unwrap()
    }

    fn seed_cache(path: &std::path::Path, pct: f64, age_seconds: i64) {
        let entry = CacheEntry {
            cached_at: Utc::now() - Duration::seconds(age_seconds),
            data: snapshot_with_five_hour(pct),
        };
        save_json_atomic(path, &entry).unwrap();
    }

    struct CountingFetcher {
        calls: Cell<u32>,
        result: fn() -> Result<UsageSnapshot, FetchError>,
    }

    impl UsageFetcher for CountingFetcher {
        fn fetch_usage(&self) -> Result<UsageSnapshot, FetchError> {
            self.calls.set(self.calls.get() + 1);
            (self.result)()
        }
    }

    fn ok_fetcher() -> CountingFetcher {
        CountingFetcher {
            calls: Cell::new(0),
            result: || Ok(snapshot_with_five_hour(42.0)),
        }
    }

    #[test]
    fn test_fresh_entry_skips_fetcher() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        seed_cache(&path, 10.0, 30);

        let cache = CacheManager::new(path, 60);
        let fetcher = ok_fetcher();
        let result = cache.get(&fetcher).unwrap();

        assert_eq!(fetcher.calls.get(), 0);
        assert!(!result.stale);
        assert_eq!(result.snapshot.five_hour_pct(), 10.0);
    }

    #[test]
    fn test_expired_entry_refetches() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        seed_cache(&path, 10.0, 65);

        let cache = CacheManager::new(path.clone(), 60);
        let fetcher = ok_fetcher();
        let result = cache.get(&fetcher).unwrap();

        assert_eq!(fetcher.calls.get(), 1);
        assert_eq!(result.snapshot.five_hour_pct(), 42.0);

        // The refresh was persisted; a second call within the TTL is a hit.
        let result = cache.get(&fetcher).unwrap();
        assert_eq!(fetcher.calls.get(), 1);
        assert!(!result.stale);
    }

    #[test]
    fn test_missing_cache_fetches_and_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let cache = CacheManager::new(path.clone(), 60);
        let fetcher = ok_fetcher();
        cache.get(&fetcher).unwrap();

        assert_eq!(fetcher.calls.get(), 1);
        let entry: Option<CacheEntry> = crate::store::load_json(&path);
        assert_eq!(entry.unwrap().data.five_hour_pct(), 42.0);
    }

    #[test]
    fn test_corrupt_cache_is_treated_as_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "not json at all").unwrap();

        let cache = CacheManager::new(path, 60);
        let fetcher = ok_fetcher();
        let result = cache.get(&fetcher).unwrap();

        assert_eq!(fetcher.calls.get(), 1);
        assert!(!result.stale);
    }

    #[test]
    fn test_fetch_failure_falls_back_to_stale_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        seed_cache(&path, 33.0, 3600);

        let cache = CacheManager::new(path, 60);
        let fetcher = CountingFetcher {
            calls: Cell::new(0),
            result: || Err(FetchError::Network("unreachable".into())),
        };
        let result = cache.get(&fetcher).unwrap();

        assert!(result.stale);
        assert_eq!(result.snapshot.five_hour_pct(), 33.0);
    }

    #[test]
    fn test_fetch_failure_without_cache_propagates() {
        let dir = tempdir().unwrap();
        let cache = CacheManager::new(dir.path().join("cache.json"), 60);
        let fetcher = CountingFetcher {
            calls: Cell::new(0),
            result: || Err(FetchError::Network("unreachable".into())),
        };
        assert!(matches!(cache.get(&fetcher), Err(FetchError::Network(_))));
    }

    #[test]
    fn test_auth_failure_is_not_masked_by_stale_cache() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        seed_cache(&path, 33.0, 3600);

        let cache = CacheManager::new(path, 60);
        let fetcher = CountingFetcher {
            calls: Cell::new(0),
            result: || Err(FetchError::Auth("expired".into())),
        };
        assert!(matches!(cache.get(&fetcher), Err(FetchError::Auth(_))));
    }

    #[test]
    fn test_ttl_boundary_counts_as_stale() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        seed_cache(&path, 10.0, 60);

        let cache = CacheManager::new(path, 60);
        let fetcher = ok_fetcher();
        cache.get(&fetcher).unwrap();
        assert_eq!(fetcher.calls.get(), 1);
    }
}
