//! Per-team progress records.
//!
//! `RunRecord` is the team's in-flight puzzle attempt, `CompletedSet` the ids
//! it has solved. Both are persisted by [`crate::storage::ProgressStore`]; the
//! serialized field names match the portal's browser-storage layout so older
//! saves keep loading.

use serde::{Deserialize, Serialize};

/// The live attempt for one team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    #[serde(rename = "questionId", alias = "puzzleId")]
    pub puzzle_id: String,
    /// Milliseconds since the Unix epoch.
    pub started_at: i64,
    pub attempts: u32,
    pub completed: bool,
    /// Frozen copy of `elapsed_seconds` at the moment of success.
    #[serde(
        rename = "completedTime",
        alias = "completedElapsedSeconds",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_elapsed_seconds: Option<u64>,
    #[serde(rename = "elapsedTime", alias = "elapsedSeconds", default)]
    pub elapsed_seconds: u64,
}

impl RunRecord {
    pub fn fresh(puzzle_id: impl Into<String>, started_at: i64) -> Self {
        Self {
            puzzle_id: puzzle_id.into(),
            started_at,
            attempts: 0,
            completed: false,
            completed_elapsed_seconds: None,
            elapsed_seconds: 0,
        }
    }

    /// Mark the run solved, freezing the current elapsed time.
    pub fn complete(&mut self) {
        self.completed = true;
        self.completed_elapsed_seconds = Some(self.elapsed_seconds);
    }
}

/// Ids a team has solved. Only ever grows; insertion order is kept for the
/// persisted array but carries no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct CompletedSet(Vec<String>);

impl CompletedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the id was already present.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.contains(&id) {
            return false;
        }
        self.0.push(id);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|c| c == id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}

impl<S: Into<String>> FromIterator<S> for CompletedSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

impl From<Vec<String>> for CompletedSet {
    fn from(ids: Vec<String>) -> Self {
        ids.into_iter().collect()
    }
}

impl From<CompletedSet> for Vec<String> {
    fn from(set: CompletedSet) -> Self {
        set.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_record_layout() {
        let mut record = RunRecord::fresh("q1", 1_700_000_000_000);
        record.attempts = 2;
        record.elapsed_seconds = 37;

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["questionId"], "q1");
        assert_eq!(json["startedAt"], 1_700_000_000_000i64);
        assert_eq!(json["attempts"], 2);
        assert_eq!(json["completed"], false);
        assert_eq!(json["elapsedTime"], 37);
        assert!(json.get("completedTime").is_none());
    }

    #[test]
    fn test_run_record_missing_elapsed_defaults_to_zero() {
        let record: RunRecord = serde_json::from_str(
            r#"{"questionId":"q2","startedAt":5,"attempts":1,"completed":false}"#,
        )
        .unwrap();
        assert_eq!(record.elapsed_seconds, 0);
        assert_eq!(record.completed_elapsed_seconds, None);
    }

    #[test]
    fn test_complete_freezes_elapsed() {
        let mut record = RunRecord::fresh("q1", 0);
        record.elapsed_seconds = 42;
        record.complete();
        assert!(record.completed);
        assert_eq!(record.completed_elapsed_seconds, Some(42));
    }

    #[test]
    fn test_completed_set_is_a_set() {
        let mut set = CompletedSet::new();
        assert!(set.insert("q1"));
        assert!(set.insert("q2"));
        assert!(!set.insert("q1"));
        assert_eq!(set.len(), 2);

        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["q1","q2"]"#);

        let dedup: CompletedSet = serde_json::from_str(r#"["a","b","a"]"#).unwrap();
        assert_eq!(dedup.len(), 2);
    }
}
