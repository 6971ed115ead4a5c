//! Challenge Session Controller
//!
//! Drives one team through the catalog:
//!
//! ```text
//! Loading ──► Assigning ──┐
//!    │                    ├──► Active ──(wrong flag)──► Active
//!    └──────► Resuming ───┘      │
//!                                └──(right flag)──► CompletedTransient
//!                                                        │ display delay
//!                            Active ◄── NextAssigning ◄──┤
//!                                                        └──► AllDone
//! ```
//!
//! The session is the only writer of its team's progress. Every mutation goes
//! through the store immediately (the timer writes on every tick), so a
//! restart loses at most one tick.
//!
//! Two background tasks may exist per session, each held as a single owned
//! handle: the one-second timer, alive only while `Active`, and the delayed
//! follow-up after a result banner. Both are aborted on every exit path, and
//! both check the session generation before touching state so a task that
//! outlives a team switch does nothing.

use chrono::Utc;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::catalog::{CatalogError, DownloadBlob, PuzzleCatalog, PuzzleView};
use crate::config::SessionConfig;
use crate::identity::TeamIdentity;
use crate::progress::{CompletedSet, RunRecord};
use crate::reporter::{CompletionRecord, ResultReporter};
use crate::storage::ProgressStore;
use crate::util::{format_elapsed, now_millis};

/// Random source used to pick the next puzzle.
pub type PuzzlePicker = Box<dyn RngCore + Send>;

/// A picker seeded from OS entropy.
pub fn entropy_picker() -> PuzzlePicker {
    Box::new(StdRng::from_entropy())
}

/// A reproducible picker, for tests and replays.
pub fn seeded_picker(seed: u64) -> PuzzlePicker {
    Box::new(StdRng::seed_from_u64(seed))
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No puzzle is currently assigned")]
    NoActiveRun,
    #[error("The current puzzle is already solved")]
    AlreadyCompleted,
    #[error("All puzzles are solved")]
    AllDone,
    #[error("The current puzzle has no artifact")]
    NoArtifact,
    #[error("Artifact unavailable: {0}")]
    Artifact(#[from] CatalogError),
    #[error("Session is shut down")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Loading,
    Assigning,
    Resuming,
    Active,
    CompletedTransient,
    NextAssigning,
    AllDone,
}

/// Banner shown after a submission until the display delay runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmitResult {
    Correct,
    Incorrect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Correct {
        puzzle_id: String,
        elapsed_seconds: u64,
        attempts: u32,
        /// Every catalog puzzle is now solved; the session will settle in
        /// `AllDone` instead of assigning another.
        all_done: bool,
    },
    Incorrect {
        attempts: u32,
    },
}

/// Everything the presentation layer renders. Never carries the flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub phase: Phase,
    pub team: TeamIdentity,
    pub puzzle: Option<PuzzleView>,
    pub run: Option<RunRecord>,
    pub completed_count: usize,
    pub total: usize,
    pub last_result: Option<SubmitResult>,
}

impl SessionView {
    /// Timer text, `HH:MM:SS`.
    pub fn elapsed_display(&self) -> Option<String> {
        self.run.as_ref().map(|r| format_elapsed(r.elapsed_seconds))
    }

    pub fn is_all_done(&self) -> bool {
        self.phase == Phase::AllDone
    }
}

/// Handles shared by every session of a portal.
#[derive(Clone)]
pub struct SessionServices {
    pub catalog: Arc<PuzzleCatalog>,
    pub store: ProgressStore,
    pub reporter: Arc<dyn ResultReporter>,
    pub config: SessionConfig,
    pub artifact_root: PathBuf,
}

#[derive(Debug, Clone, Copy)]
enum FollowUp {
    Advance,
    ClearResult,
}

struct SessionState {
    team: TeamIdentity,
    phase: Phase,
    run: Option<RunRecord>,
    completed: CompletedSet,
    last_result: Option<SubmitResult>,
    generation: u64,
    revision: u64,
    closed: bool,
    picker: PuzzlePicker,
    timer: Option<JoinHandle<()>>,
    follow_up: Option<JoinHandle<()>>,
}

impl SessionState {
    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!(
                "Team {}: {:?} -> {:?}",
                self.team.team_id, self.phase, phase
            );
            self.phase = phase;
        }
    }

    fn stop_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }

    fn cancel_follow_up(&mut self) {
        if let Some(handle) = self.follow_up.take() {
            handle.abort();
        }
    }
}

struct Shared {
    services: SessionServices,
    state: Mutex<SessionState>,
    views: watch::Sender<SessionView>,
    /// Revision of the last view sent. Never taken while `state` is held.
    published: Mutex<u64>,
    runtime: Handle,
}

/// A rendered view waiting to be sent once the state lock is released.
struct Snapshot {
    revision: u64,
    view: SessionView,
}

/// One team's live challenge session.
///
/// Must be created inside a Tokio runtime; background work keeps running on
/// that runtime, so the session may then be driven from any thread. Dropping
/// the session cancels its timer and any pending follow-up.
pub struct ChallengeSession {
    shared: Arc<Shared>,
}

impl ChallengeSession {
    /// Load (or assign) the team's puzzle and start the clock.
    pub fn start(services: SessionServices, team: TeamIdentity, picker: PuzzlePicker) -> Self {
        let placeholder = SessionView {
            phase: Phase::Loading,
            team: team.clone(),
            puzzle: None,
            run: None,
            completed_count: 0,
            total: services.catalog.len(),
            last_result: None,
        };
        let (views, _) = watch::channel(placeholder);
        let runtime = Handle::current();

        let shared = Arc::new(Shared {
            services,
            state: Mutex::new(SessionState {
                team,
                phase: Phase::Loading,
                run: None,
                completed: CompletedSet::new(),
                last_result: None,
                generation: 0,
                revision: 0,
                closed: false,
                picker,
                timer: None,
                follow_up: None,
            }),
            views,
            published: Mutex::new(0),
            runtime,
        });

        let snapshot = {
            let mut st = shared.state.lock();
            shared.initialize(&mut st);
            shared.snapshot(&mut st)
        };
        shared.publish(snapshot);

        Self { shared }
    }

    /// Current snapshot.
    pub fn view(&self) -> SessionView {
        let st = self.shared.state.lock();
        self.shared.render(&st)
    }

    /// Receives a fresh snapshot on every transition and timer tick.
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.shared.views.subscribe()
    }

    pub fn team(&self) -> TeamIdentity {
        self.shared.state.lock().team.clone()
    }

    /// Check a candidate flag against the current puzzle.
    ///
    /// Every call that reaches evaluation counts as an attempt, right or
    /// wrong.
    pub fn submit(&self, candidate: &str) -> Result<SubmitOutcome, SessionError> {
        let shared = &self.shared;
        let mut st = shared.state.lock();
        if st.closed {
            return Err(SessionError::Closed);
        }
        if st.phase == Phase::AllDone {
            return Err(SessionError::AllDone);
        }

        let team_id = st.team.team_id.clone();
        let Some(run) = st.run.as_mut() else {
            return Err(SessionError::NoActiveRun);
        };
        if run.completed {
            return Err(SessionError::AlreadyCompleted);
        }
        let Some(puzzle) = shared.services.catalog.get(&run.puzzle_id) else {
            return Err(SessionError::NoActiveRun);
        };

        run.attempts = run.attempts.saturating_add(1);
        let correct = puzzle.check_flag(candidate);
        if correct {
            run.complete();
        }
        let run = run.clone();

        if let Err(e) = shared.services.store.put(&team_id, &run) {
            error!("{:#}", e);
        }

        if !correct {
            debug!(
                "Team {}: incorrect flag for {} (attempt {})",
                team_id, run.puzzle_id, run.attempts
            );
            st.last_result = Some(SubmitResult::Incorrect);
            shared.schedule(&mut st, FollowUp::ClearResult);
            let snapshot = shared.snapshot(&mut st);
            drop(st);
            shared.publish(snapshot);
            return Ok(SubmitOutcome::Incorrect {
                attempts: run.attempts,
            });
        }

        st.stop_timer();
        if st.completed.insert(run.puzzle_id.clone()) {
            if let Err(e) = shared.services.store.put_completed(&team_id, &st.completed) {
                error!("{:#}", e);
            }
        }

        let elapsed = run.completed_elapsed_seconds.unwrap_or(run.elapsed_seconds);
        let all_done = shared.services.catalog.all_solved(&st.completed);
        info!(
            "Team {} solved {} in {} ({} attempts), {}/{} done",
            team_id,
            run.puzzle_id,
            format_elapsed(elapsed),
            run.attempts,
            shared.services.catalog.solved_count(&st.completed),
            shared.services.catalog.len()
        );

        shared.spawn_report(CompletionRecord::new(
            st.team.display_name.clone(),
            run.puzzle_id.clone(),
            elapsed,
            run.attempts,
            Utc::now(),
        ));

        st.last_result = Some(SubmitResult::Correct);
        st.set_phase(Phase::CompletedTransient);
        shared.schedule(&mut st, FollowUp::Advance);
        let snapshot = shared.snapshot(&mut st);
        drop(st);
        shared.publish(snapshot);

        Ok(SubmitOutcome::Correct {
            puzzle_id: run.puzzle_id,
            elapsed_seconds: elapsed,
            attempts: run.attempts,
            all_done,
        })
    }

    /// Materialize the current puzzle's artifact for download.
    pub fn download_artifact(&self) -> Result<DownloadBlob, SessionError> {
        let artifact = {
            let st = self.shared.state.lock();
            if st.closed {
                return Err(SessionError::Closed);
            }
            if st.phase == Phase::AllDone {
                return Err(SessionError::AllDone);
            }
            let run = st.run.as_ref().ok_or(SessionError::NoActiveRun)?;
            if run.completed {
                return Err(SessionError::AlreadyCompleted);
            }
            self.shared
                .services
                .catalog
                .get(&run.puzzle_id)
                .and_then(|p| p.artifact.clone())
                .ok_or(SessionError::NoArtifact)?
        };

        Ok(artifact.materialize(&self.shared.services.artifact_root)?)
    }

    /// Re-read the store and rebuild the session, as a page reload would.
    pub fn reload(&self) {
        let mut st = self.shared.state.lock();
        if st.closed {
            return;
        }
        self.shared.reset(&mut st);
        self.shared.initialize(&mut st);
        let snapshot = self.shared.snapshot(&mut st);
        drop(st);
        self.shared.publish(snapshot);
    }

    /// Move the session to another team. The previous team's timer stops
    /// before anything of the new team is read.
    pub fn switch_team(&self, team: TeamIdentity) {
        let mut st = self.shared.state.lock();
        if st.closed {
            return;
        }
        info!("Switching session from team {} to {}", st.team.team_id, team.team_id);
        self.shared.reset(&mut st);
        st.team = team;
        self.shared.initialize(&mut st);
        let snapshot = self.shared.snapshot(&mut st);
        drop(st);
        self.shared.publish(snapshot);
    }

    /// Stop all background work. Further submissions fail with
    /// [`SessionError::Closed`].
    pub fn shutdown(&self) {
        let mut st = self.shared.state.lock();
        if st.closed {
            return;
        }
        self.shared.reset(&mut st);
        st.closed = true;
        debug!("Session for team {} shut down", st.team.team_id);
    }

    pub fn is_timer_running(&self) -> bool {
        self.shared
            .state
            .lock()
            .timer
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ChallengeSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Shared {
    fn render(&self, st: &SessionState) -> SessionView {
        let catalog = &self.services.catalog;
        let puzzle = match st.phase {
            Phase::AllDone => None,
            _ => st
                .run
                .as_ref()
                .and_then(|r| catalog.get(&r.puzzle_id))
                .map(|p| p.view()),
        };

        SessionView {
            phase: st.phase,
            team: st.team.clone(),
            puzzle,
            run: st.run.clone(),
            completed_count: catalog.solved_count(&st.completed),
            total: catalog.len(),
            last_result: st.last_result,
        }
    }

    fn snapshot(&self, st: &mut SessionState) -> Snapshot {
        st.revision += 1;
        Snapshot {
            revision: st.revision,
            view: self.render(st),
        }
    }

    /// Send a snapshot unless a newer one already went out. Never called with
    /// the state lock held.
    fn publish(&self, snapshot: Snapshot) {
        let mut published = self.published.lock();
        if snapshot.revision > *published {
            *published = snapshot.revision;
            self.views.send_replace(snapshot.view);
        }
    }

    /// Invalidate every outstanding task and forget the in-memory mirror.
    fn reset(&self, st: &mut SessionState) {
        st.generation += 1;
        st.stop_timer();
        st.cancel_follow_up();
        st.run = None;
        st.last_result = None;
        st.set_phase(Phase::Loading);
    }

    fn initialize(self: &Arc<Self>, st: &mut SessionState) {
        let catalog = &self.services.catalog;
        let store = &self.services.store;
        let team_id = st.team.team_id.clone();

        st.set_phase(Phase::Loading);
        st.completed = store.get_completed(&team_id);
        let stored = store.get(&team_id);

        if catalog.all_solved(&st.completed) {
            info!("Team {} has solved every puzzle", team_id);
            st.run = None;
            st.set_phase(Phase::AllDone);
            return;
        }

        let Some(record) = stored else {
            self.assign(st, Phase::Assigning);
            return;
        };

        if !catalog.contains(&record.puzzle_id) {
            warn!(
                "Team {}: stored run references unknown puzzle {}, reassigning",
                team_id, record.puzzle_id
            );
            self.discard_run(&team_id);
            self.assign(st, Phase::Assigning);
            return;
        }

        if record.completed {
            // Completed but never advanced; make sure the solve is counted.
            info!(
                "Team {}: finishing interrupted completion of {}",
                team_id, record.puzzle_id
            );
            if st.completed.insert(record.puzzle_id.clone()) {
                if let Err(e) = store.put_completed(&team_id, &st.completed) {
                    error!("{:#}", e);
                }
            }
            self.discard_run(&team_id);
            if catalog.all_solved(&st.completed) {
                st.run = None;
                st.set_phase(Phase::AllDone);
            } else {
                self.assign(st, Phase::NextAssigning);
            }
            return;
        }

        if st.completed.contains(&record.puzzle_id) {
            warn!(
                "Team {}: stored run for already solved {}, reassigning",
                team_id, record.puzzle_id
            );
            self.discard_run(&team_id);
            self.assign(st, Phase::Assigning);
            return;
        }

        st.set_phase(Phase::Resuming);
        info!(
            "Team {}: resuming {} at {} ({} attempts)",
            team_id,
            record.puzzle_id,
            format_elapsed(record.elapsed_seconds),
            record.attempts
        );
        st.run = Some(record);
        self.activate(st);
    }

    /// Pick an unsolved puzzle uniformly at random and start a fresh run.
    fn assign(self: &Arc<Self>, st: &mut SessionState, via: Phase) {
        st.set_phase(via);
        let team_id = st.team.team_id.clone();

        let picked = {
            let available = self.services.catalog.available(&st.completed);
            available
                .choose(&mut *st.picker)
                .map(|p| p.id.clone())
        };

        let Some(puzzle_id) = picked else {
            st.run = None;
            st.set_phase(Phase::AllDone);
            return;
        };

        let record = RunRecord::fresh(puzzle_id, now_millis());
        if let Err(e) = self.services.store.put(&team_id, &record) {
            error!("{:#}", e);
        }
        info!("Team {}: assigned {}", team_id, record.puzzle_id);

        st.run = Some(record);
        self.activate(st);
    }

    fn activate(self: &Arc<Self>, st: &mut SessionState) {
        st.set_phase(Phase::Active);
        st.stop_timer();
        st.timer = Some(self.spawn_timer(st.generation));
    }

    fn discard_run(&self, team_id: &str) {
        if let Err(e) = self.services.store.clear(team_id) {
            error!("{:#}", e);
        }
    }

    fn spawn_timer(self: &Arc<Self>, generation: u64) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let period = self.services.config.tick_interval();

        self.runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                if !shared.tick(generation) {
                    break;
                }
            }
        })
    }

    /// One second of play. Returns `false` once the timer has no business
    /// running any more.
    fn tick(&self, generation: u64) -> bool {
        let mut st = self.state.lock();
        if st.generation != generation || st.closed || st.phase != Phase::Active {
            return false;
        }

        let team_id = st.team.team_id.clone();
        let Some(run) = st.run.as_mut() else {
            return false;
        };
        if run.completed {
            return false;
        }

        run.elapsed_seconds += 1;
        if let Err(e) = self.services.store.put(&team_id, run) {
            error!("{:#}", e);
        }
        let snapshot = self.snapshot(&mut st);
        drop(st);
        self.publish(snapshot);
        true
    }

    fn schedule(self: &Arc<Self>, st: &mut SessionState, action: FollowUp) {
        let weak = Arc::downgrade(self);
        let generation = st.generation;
        let delay: Duration = self.services.config.display_delay();

        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(shared) = weak.upgrade() {
                shared.follow_up(generation, action);
            }
        });

        if let Some(previous) = st.follow_up.replace(handle) {
            previous.abort();
        }
    }

    fn follow_up(self: &Arc<Self>, generation: u64, action: FollowUp) {
        let mut st = self.state.lock();
        if st.generation != generation || st.closed {
            return;
        }
        // This task is the one being tracked; it is finishing on its own.
        st.follow_up = None;

        match action {
            FollowUp::ClearResult => {
                if st.last_result == Some(SubmitResult::Incorrect) {
                    st.last_result = None;
                    let snapshot = self.snapshot(&mut st);
                    drop(st);
                    self.publish(snapshot);
                }
            }
            FollowUp::Advance => {
                if st.phase != Phase::CompletedTransient {
                    return;
                }
                st.last_result = None;
                if self.services.catalog.all_solved(&st.completed) {
                    info!("Team {} has solved every puzzle", st.team.team_id);
                    st.run = None;
                    st.set_phase(Phase::AllDone);
                } else {
                    let team_id = st.team.team_id.clone();
                    self.discard_run(&team_id);
                    st.run = None;
                    self.assign(&mut st, Phase::NextAssigning);
                }
                let snapshot = self.snapshot(&mut st);
                drop(st);
                self.publish(snapshot);
            }
        }
    }

    fn spawn_report(&self, record: CompletionRecord) {
        let reporter = Arc::clone(&self.services.reporter);
        self.runtime.spawn(async move {
            if let Err(e) = reporter.report(&record).await {
                warn!(
                    "Failed to report {} / {} to leaderboard: {}",
                    record.team_name, record.question_id, e
                );
            }
        });
    }
}
