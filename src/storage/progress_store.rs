//! Typed per-team progress on top of a [`KeyValueBackend`].
//!
//! Reads never fail: a missing, unreadable or undecodable entry is reported as
//! absent (or an empty completed set) so the session can reassign instead of
//! getting stuck. Writes surface backend errors to the caller, which logs them.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::warn;

use super::{KeyValueBackend, MemoryBackend};
use crate::progress::{CompletedSet, RunRecord};

const PROGRESS_PREFIX: &str = "cybergauntlet_progress_";
const COMPLETED_PREFIX: &str = "cybergauntlet_completed_";

pub fn progress_key(team_id: &str) -> String {
    format!("{PROGRESS_PREFIX}{team_id}")
}

pub fn completed_key(team_id: &str) -> String {
    format!("{COMPLETED_PREFIX}{team_id}")
}

#[derive(Clone)]
pub struct ProgressStore {
    backend: Arc<dyn KeyValueBackend>,
}

impl ProgressStore {
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// The team's run record, or `None` if absent or corrupt.
    pub fn get(&self, team_id: &str) -> Option<RunRecord> {
        let key = progress_key(team_id);
        let raw = self.read_raw(&key)?;
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Discarding unreadable progress record for team {}: {}", team_id, e);
                None
            }
        }
    }

    pub fn put(&self, team_id: &str, record: &RunRecord) -> Result<()> {
        let value = serde_json::to_string(record)?;
        self.backend
            .write(&progress_key(team_id), &value)
            .with_context(|| format!("Failed to save progress for team {team_id}"))
    }

    pub fn clear(&self, team_id: &str) -> Result<()> {
        self.backend
            .remove(&progress_key(team_id))
            .with_context(|| format!("Failed to clear progress for team {team_id}"))
    }

    /// The team's completed set, empty if absent or corrupt.
    pub fn get_completed(&self, team_id: &str) -> CompletedSet {
        let key = completed_key(team_id);
        let Some(raw) = self.read_raw(&key) else {
            return CompletedSet::new();
        };
        match serde_json::from_str(&raw) {
            Ok(set) => set,
            Err(e) => {
                warn!("Discarding unreadable completed list for team {}: {}", team_id, e);
                CompletedSet::new()
            }
        }
    }

    pub fn put_completed(&self, team_id: &str, completed: &CompletedSet) -> Result<()> {
        let value = serde_json::to_string(completed)?;
        self.backend
            .write(&completed_key(team_id), &value)
            .with_context(|| format!("Failed to save completed list for team {team_id}"))
    }

    fn read_raw(&self, key: &str) -> Option<String> {
        match self.backend.read(key) {
            Ok(value) => value,
            Err(e) => {
                warn!("Progress storage read failed for {}: {:#}", key, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteBackend;

    #[test]
    fn test_record_round_trip_per_team() {
        let store = ProgressStore::in_memory();
        let mut record = RunRecord::fresh("q1", 10);
        record.elapsed_seconds = 5;

        store.put("alpha", &record).unwrap();
        assert_eq!(store.get("alpha"), Some(record));
        assert!(store.get("beta").is_none());

        store.clear("alpha").unwrap();
        assert!(store.get("alpha").is_none());
    }

    #[test]
    fn test_corrupt_entries_read_as_absent() {
        let backend = Arc::new(MemoryBackend::new());
        let store = ProgressStore::new(backend.clone());

        backend.write(&progress_key("t"), "{not json").unwrap();
        backend.write(&completed_key("t"), r#"{"q1":true}"#).unwrap();

        assert!(store.get("t").is_none());
        assert!(store.get_completed("t").is_empty());
    }

    #[test]
    fn test_missing_fields_read_as_absent() {
        let backend = Arc::new(MemoryBackend::new());
        let store = ProgressStore::new(backend.clone());

        backend
            .write(&progress_key("t"), r#"{"attempts":3}"#)
            .unwrap();
        assert!(store.get("t").is_none());
    }

    #[test]
    fn test_completed_overwrites() {
        let store = ProgressStore::new(Arc::new(SqliteBackend::in_memory().unwrap()));
        let mut done = CompletedSet::new();
        done.insert("q1");
        store.put_completed("t", &done).unwrap();

        done.insert("q3");
        store.put_completed("t", &done).unwrap();

        let loaded = store.get_completed("t");
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains("q1") && loaded.contains("q3"));
    }

    #[test]
    fn test_key_scheme() {
        assert_eq!(progress_key("NEXUS"), "cybergauntlet_progress_NEXUS");
        assert_eq!(completed_key("NEXUS"), "cybergauntlet_completed_NEXUS");
    }
}
