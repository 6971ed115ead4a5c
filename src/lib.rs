//! Cyber Gauntlet challenge core
//!
//! Teams log in, get a random puzzle from a fixed catalog, and submit flags
//! until every puzzle is solved. This crate holds the progression logic; the
//! page that renders it and the service that authenticates teams live
//! elsewhere.
//!
//! ## Module Structure
//!
//! - `catalog`: puzzle definitions and artifact delivery
//! - `progress`: run record and completed set
//! - `storage`: key-value backends and the per-team progress store
//! - `session`: the challenge state machine
//! - `reporter`: best-effort completion records for the leaderboard
//! - `identity`: team identity and roster
//! - `config`: portal configuration
//! - `portal`: composition root
//! - `logging`: tracing setup
//! - `util`: shared helpers

pub mod catalog;
pub mod config;
pub mod identity;
pub mod logging;
pub mod portal;
pub mod progress;
pub mod reporter;
pub mod session;
pub mod storage;
pub mod util;

pub use catalog::{
    ArtifactRef, ArtifactSource, CatalogError, DownloadBlob, PuzzleCatalog, PuzzleDefinition,
    PuzzleView,
};
pub use config::{LedgerConfig, PortalConfig, SessionConfig, StoreConfig};
pub use identity::{TeamEntry, TeamIdentity, TeamRoster};
pub use portal::Portal;
pub use progress::{CompletedSet, RunRecord};
pub use reporter::{CompletionRecord, LedgerReporter, NoopReporter, ReportError, ResultReporter};
pub use session::{
    entropy_picker, seeded_picker, ChallengeSession, Phase, PuzzlePicker, SessionError,
    SessionServices, SessionView, SubmitOutcome, SubmitResult,
};
pub use storage::{KeyValueBackend, MemoryBackend, ProgressStore, SqliteBackend};
