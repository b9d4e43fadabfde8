//! Dedup store: signal id → last-sent timestamp
//!
//! An explicit store object injected into the dispatcher, not a module-level
//! globals. Entries are pruned lazily by the dispatcher on each attempt, not
//! by a background timer. The durable variant persists the map as a JSON file
//! rewritten on every mutation so suppression survives process restarts; the
//! in-memory variant is for dry-run and tests.

use crate::error::Result;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

pub struct DedupStore {
    entries: Mutex<HashMap<String, i64>>,
    path: Option<PathBuf>,
}

impl DedupStore {
    /// Volatile store; suppression state is lost on restart.
    pub fn in_memory() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            path: None,
        }
    }

    /// Durable store backed by a JSON file, loaded if it already exists.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            HashMap::new()
        };
        debug!(records = entries.len(), path = %path.display(), "opened dedup store");
        Ok(Self {
            entries: Mutex::new(entries),
            path: Some(path),
        })
    }

    /// Unix-seconds timestamp of the last send for this signal id.
    pub fn get(&self, signal_id: &str) -> Option<i64> {
        self.entries.lock().get(signal_id).copied()
    }

    pub fn set(&self, signal_id: &str, sent_at: i64) -> Result<()> {
        let mut entries = self.entries.lock();
        entries.insert(signal_id.to_string(), sent_at);
        self.persist(&entries)
    }

    /// Drop every record older than `cutoff`; returns how many were removed.
    pub fn purge_older_than(&self, cutoff: i64) -> Result<usize> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, sent_at| *sent_at >= cutoff);
        let removed = before - entries.len();
        if removed > 0 {
            self.persist(&entries)?;
        }
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn persist(&self, entries: &HashMap<String, i64>) -> Result<()> {
        if let Some(path) = &self.path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, serde_json::to_string(entries)?)?;
        }
        Ok(())
    }
}
