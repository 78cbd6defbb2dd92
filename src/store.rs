//! File-backed state persistence shared by the cache, history, and
//! notification stores.
//!
//! Independent invocations (a shell prompt, a status-bar poller, a watch loop)
//! share these files with no coordination, so both sides are hardened:
//! reads treat missing or corrupt content as absent, and writes go through a
//! temporary file followed by a rename so a concurrent reader never observes
//! a partially written file. Last-write-wins is acceptable for this workload.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::warn;

/// Read a JSON state file. Missing and malformed files both read as `None`;
/// corruption is logged but never fatal.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(
                file = %path.display(),
                error = %e,
                "State file is corrupt, treating as absent"
            );
            None
        }
    }
}

/// Atomically replace a JSON state file: serialize to a temporary file in the
/// same directory, then rename over the target.
///
/// Each writer gets its own randomly named temporary file. A shared temp name
/// would let one invocation truncate another's in-flight write and publish
/// the torn result through the rename.
pub fn save_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create state directory: {}", parent.display()))?;

    let content =
        serde_json::to_string_pretty(value).context("Failed to serialize state to JSON")?;

    let mut tmp = NamedTempFile::new_in(parent).with_context(|| {
        format!(
            "Failed to create temporary state file in: {}",
            parent.display()
        )
    })?;
    tmp.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write temporary state file: {}", tmp.path().display()))?;
    tmp.persist(path)
        .with_context(|| format!("Failed to replace state file: {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        value: u32,
    }

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");

        save_json_atomic(&path, &Sample { value: 7 }).unwrap();
        let loaded: Option<Sample> = load_json(&path);
        assert_eq!(loaded, Some(Sample { value: 7 }));
    }

    #[test]
    fn test_missing_file_reads_as_none() {
        let dir = tempdir().unwrap();
        let loaded: Option<Sample> = load_json(&dir.path().join("absent.json"));
        assert!(loaded.is_none());
    }

    #[test]
    fn test_corrupt_file_reads_as_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();

        let loaded: Option<Sample> = load_json(&path);
        assert!(loaded.is_none());
    }

    #[test]
    fn test_write_creates_parent_dirs_and_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        save_json_atomic(&path, &Sample { value: 1 }).unwrap();
        assert!(path.exists());
        let entries = fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_concurrent_writers_never_expose_torn_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        save_json_atomic(&path, &Sample { value: 0 }).unwrap();

        let writers: Vec<_> = (1..=2u32)
            .map(|seed| {
                let path = path.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        save_json_atomic(&path, &Sample { value: seed * 1000 + i }).unwrap();
                    }
                })
            })
            .collect();

        // Once seeded, every read during the write storm must see a
        // complete file.
        for _ in 0..200 {
            let loaded: Option<Sample> = load_json(&path);
            assert!(loaded.is_some());
        }
        for writer in writers {
            writer.join().unwrap();
        }

        // The published file survives and no temp files are left behind.
        let loaded: Option<Sample> = load_json(&path);
        assert!(loaded.is_some());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
