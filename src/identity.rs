//! Team identity.
//!
//! The session only needs a `(team_id, display_name)` pair. `TeamRoster` is
//! the simplest identity source: a fixed list of teams, each unlocked by its
//! leader's name.

use serde::{Deserialize, Serialize};

/// Who is playing. `team_id` scopes all stored progress.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TeamIdentity {
    pub team_id: String,
    pub display_name: String,
}

impl TeamIdentity {
    pub fn new(team_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            team_id: team_id.into(),
            display_name: display_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamEntry {
    pub team_name: String,
    pub leader_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct TeamRoster {
    entries: Vec<TeamEntry>,
}

impl TeamRoster {
    pub fn new(entries: Vec<TeamEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Match team and leader names case-insensitively, ignoring surrounding
    /// whitespace. The roster's spelling of the team name becomes both the
    /// identifier and the display name.
    pub fn authenticate(&self, team_name: &str, leader_name: &str) -> Option<TeamIdentity> {
        let team_name = team_name.trim();
        let leader_name = leader_name.trim();
        if team_name.is_empty() || leader_name.is_empty() {
            return None;
        }

        self.entries
            .iter()
            .find(|e| {
                e.team_name.eq_ignore_ascii_case(team_name)
                    && e.leader_name.eq_ignore_ascii_case(leader_name)
            })
            .map(|e| TeamIdentity::new(e.team_name.clone(), e.team_name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> TeamRoster {
        TeamRoster::new(vec![
            TeamEntry {
                team_name: "SnackOverflow".into(),
                leader_name: "Varshitha Vasaguddam".into(),
            },
            TeamEntry {
                team_name: "NEXUS".into(),
                leader_name: "Aarav Sharma".into(),
            },
        ])
    }

    #[test]
    fn test_authenticate_is_case_insensitive() {
        let identity = roster()
            .authenticate("  nexus ", "aarav sharma")
            .unwrap();
        assert_eq!(identity.team_id, "NEXUS");
        assert_eq!(identity.display_name, "NEXUS");
    }

    #[test]
    fn test_leader_must_belong_to_team() {
        assert!(roster().authenticate("NEXUS", "Varshitha Vasaguddam").is_none());
        assert!(roster().authenticate("", "Aarav Sharma").is_none());
        assert!(roster().authenticate("NEXUS", "").is_none());
    }
}
