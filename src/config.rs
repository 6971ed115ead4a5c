//! Portal Configuration
//!
//! Defines everything the composition root needs to build a portal:
//! - Progress database location
//! - Optional remote leaderboard ledger
//! - Session timing (tick interval, result banner delay)
//! - Puzzle catalog and artifact locations
//! - Team roster
//!
//! Loaded from a TOML file or from the environment; every field has a default.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::identity::TeamEntry;

/// Complete portal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Progress storage
    pub store: StoreConfig,
    /// Remote leaderboard; reporting is disabled when absent
    pub ledger: Option<LedgerConfig>,
    /// Session timing
    pub session: SessionConfig,
    /// TOML catalog file; the built-in catalog is used when absent
    pub catalog_path: Option<PathBuf>,
    /// Directory static artifact paths are resolved against
    pub artifact_root: PathBuf,
    /// Teams allowed to log in
    pub teams: Vec<TeamEntry>,
    /// Fallback log filter when `RUST_LOG` is unset. Applied by
    /// [`PortalConfig::init_logging`], which the host calls once at startup.
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file; `None` keeps progress in memory only
    pub path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: Some(default_store_path()),
        }
    }
}

fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cyber-gauntlet")
        .join("progress.db")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Project URL of the hosted backend
    pub url: String,
    /// Public (anon) API key
    pub anon_key: String,
    /// Table completion records are appended to
    #[serde(default = "default_ledger_table")]
    pub table: String,
    /// Upper bound on a single report request
    #[serde(default = "default_ledger_timeout")]
    pub timeout_secs: u64,
}

fn default_ledger_table() -> String {
    "leaderboard".to_string()
}

fn default_ledger_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Timer resolution; each tick adds one second to the run
    pub tick_interval_ms: u64,
    /// How long a correct/incorrect banner stays up before the session moves on
    pub display_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            display_delay_ms: 3000,
        }
    }
}

impl SessionConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn display_delay(&self) -> Duration {
        Duration::from_millis(self.display_delay_ms)
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            ledger: None,
            session: SessionConfig::default(),
            catalog_path: None,
            artifact_root: PathBuf::from("public"),
            teams: Vec::new(),
            log_level: "info".to_string(),
        }
    }
}

impl PortalConfig {
    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        let config: Self =
            toml::from_str(&text).with_context(|| format!("Invalid config {:?}", path))?;
        Ok(config)
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("GAUNTLET_DB_PATH") {
            config.store.path = match path.as_str() {
                "" | ":memory:" => None,
                _ => Some(PathBuf::from(path)),
            };
        }

        config.ledger = ledger_from_env();

        if let Some(ms) = env_u64("GAUNTLET_TICK_INTERVAL_MS") {
            config.session.tick_interval_ms = ms;
        }
        if let Some(ms) = env_u64("GAUNTLET_DISPLAY_DELAY_MS") {
            config.session.display_delay_ms = ms;
        }

        if let Ok(path) = std::env::var("GAUNTLET_CATALOG") {
            config.catalog_path = Some(PathBuf::from(path));
        }
        if let Ok(root) = std::env::var("GAUNTLET_ARTIFACT_ROOT") {
            config.artifact_root = PathBuf::from(root);
        }
        if let Ok(level) = std::env::var("GAUNTLET_LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Install the global tracing subscriber with `log_level` as fallback.
    ///
    /// Returns `false` if a subscriber was already installed.
    pub fn init_logging(&self) -> bool {
        crate::logging::init(&self.log_level)
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

/// The ledger needs both URL and key; with either missing, reporting is off.
fn ledger_from_env() -> Option<LedgerConfig> {
    let url = std::env::var("SUPABASE_URL").ok().filter(|s| !s.is_empty());
    let anon_key = std::env::var("SUPABASE_ANON_KEY")
        .ok()
        .filter(|s| !s.is_empty());

    match (url, anon_key) {
        (Some(url), Some(anon_key)) => Some(LedgerConfig {
            url,
            anon_key,
            table: std::env::var("SUPABASE_LEADERBOARD_TABLE")
                .unwrap_or_else(|_| default_ledger_table()),
            timeout_secs: env_u64("SUPABASE_TIMEOUT_SECS").unwrap_or_else(default_ledger_timeout),
        }),
        _ => {
            warn!("Leaderboard ledger not configured. Set SUPABASE_URL and SUPABASE_ANON_KEY to enable reporting.");
            None
        }
    }
}
