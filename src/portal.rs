//! Portal composition root.
//!
//! Builds the long-lived services once (catalog, progress store, reporter,
//! roster) and hands them to each team session. Nothing in the crate keeps
//! global state; a host embeds one `Portal` and owns its lifetime.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::catalog::PuzzleCatalog;
use crate::config::PortalConfig;
use crate::identity::{TeamIdentity, TeamRoster};
use crate::reporter::{LedgerReporter, NoopReporter, ResultReporter};
use crate::session::{entropy_picker, ChallengeSession, PuzzlePicker, SessionServices};
use crate::storage::{MemoryBackend, ProgressStore, SqliteBackend};

pub struct Portal {
    services: SessionServices,
    roster: TeamRoster,
}

impl Portal {
    pub fn from_config(config: &PortalConfig) -> Result<Self> {
        let catalog = match &config.catalog_path {
            Some(path) => PuzzleCatalog::load(path)
                .with_context(|| format!("Failed to load puzzle catalog {:?}", path))?,
            None => PuzzleCatalog::builtin(),
        };

        let store = match config.store.path.as_deref() {
            Some(path) if path != Path::new(":memory:") => {
                ProgressStore::new(Arc::new(SqliteBackend::new(path)?))
            }
            _ => {
                info!("Progress storage kept in memory only");
                ProgressStore::new(Arc::new(MemoryBackend::new()))
            }
        };

        let reporter: Arc<dyn ResultReporter> = match &config.ledger {
            Some(ledger) => {
                let reporter = LedgerReporter::new(ledger)
                    .context("Failed to build leaderboard reporter")?;
                info!("Reporting completions to {}", reporter.endpoint());
                Arc::new(reporter)
            }
            None => Arc::new(NoopReporter),
        };

        info!(
            "Portal ready: {} puzzles, {} teams",
            catalog.len(),
            config.teams.len()
        );

        Ok(Self::new(
            SessionServices {
                catalog: Arc::new(catalog),
                store,
                reporter,
                config: config.session.clone(),
                artifact_root: config.artifact_root.clone(),
            },
            TeamRoster::new(config.teams.clone()),
        ))
    }

    pub fn new(services: SessionServices, roster: TeamRoster) -> Self {
        Self { services, roster }
    }

    pub fn catalog(&self) -> &PuzzleCatalog {
        &self.services.catalog
    }

    pub fn store(&self) -> &ProgressStore {
        &self.services.store
    }

    /// Check a team/leader pair against the roster.
    pub fn login(&self, team_name: &str, leader_name: &str) -> Option<TeamIdentity> {
        let identity = self.roster.authenticate(team_name, leader_name);
        match &identity {
            Some(id) => info!("Team {} logged in", id.team_id),
            None => info!("Rejected login for team {:?}", team_name.trim()),
        }
        identity
    }

    /// Start a session for an authenticated team. Must be called inside a
    /// Tokio runtime.
    pub fn open_session(&self, team: TeamIdentity) -> ChallengeSession {
        self.open_session_with(team, entropy_picker())
    }

    /// Like [`Portal::open_session`], with an explicit random source.
    pub fn open_session_with(&self, team: TeamIdentity, picker: PuzzlePicker) -> ChallengeSession {
        ChallengeSession::start(self.services.clone(), team, picker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::TeamEntry;
    use crate::session::Phase;

    fn memory_config() -> PortalConfig {
        let mut config = PortalConfig::default();
        config.store.path = None;
        config.teams = vec![TeamEntry {
            team_name: "Parallax".into(),
            leader_name: "Madhav Agarwal".into(),
        }];
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_and_open_session() {
        let portal = Portal::from_config(&memory_config()).unwrap();
        assert_eq!(portal.catalog().len(), 5);

        assert!(portal.login("Parallax", "someone else").is_none());
        let team = portal.login("parallax", "MADHAV AGARWAL").unwrap();

        let session = portal.open_session(team);
        let view = session.view();
        assert_eq!(view.phase, Phase::Active);
        assert_eq!(view.total, 5);
        assert!(portal.store().get("Parallax").is_some());
    }

    #[test]
    fn test_sqlite_store_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = memory_config();
        config.store.path = Some(dir.path().join("db").join("progress.db"));

        Portal::from_config(&config).unwrap();
        assert!(dir.path().join("db").join("progress.db").exists());
    }

    #[test]
    fn test_bad_catalog_path_fails() {
        let mut config = memory_config();
        config.catalog_path = Some("/nonexistent/catalog.toml".into());
        assert!(Portal::from_config(&config).is_err());
    }
}
