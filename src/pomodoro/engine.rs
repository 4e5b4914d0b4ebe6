use std::sync::Arc;

use anyhow::Context;
use serde::Serialize;

use crate::{
    clock::Clock,
    error::Result,
    recovery::{RecoveryManager, RecoveryOutcome},
    store::SnapshotStore,
};

use super::{Phase, PhaseTransition, PomodoroConfig, PomodoroState};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

pub const POMODORO_KEY: &str = "pomodoro";

/// One poll of the phase clock, for the display loop.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PhaseReading {
    pub phase: Phase,
    pub cycle: u32,
    pub total_cycles: u32,
    pub elapsed_ms: u64,
    pub remaining_ms: u64,
    pub progress_percent: f64,
    /// Remaining time has reached zero; the caller decides when to call
    /// `complete_phase`.
    pub is_expired: bool,
    pub paused: bool,
}

/// Work/break cycle state machine.
///
/// The engine never schedules anything. Callers poll the phase reads and
/// call `complete_phase` once they see the phase has expired, or earlier to
/// skip ahead.
pub struct PomodoroEngine {
    state: PomodoroState,
    clock: Arc<dyn Clock>,
    store: Arc<dyn SnapshotStore>,
    recovery: RecoveryManager,
    key: String,
}

impl PomodoroEngine {
    pub fn new(clock: Arc<dyn Clock>, store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            state: PomodoroState::new(),
            clock,
            store,
            recovery: RecoveryManager::default(),
            key: POMODORO_KEY.to_string(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_recovery(mut self, recovery: RecoveryManager) -> Self {
        self.recovery = recovery;
        self
    }

    /// Loads the persisted snapshot. Idle snapshots are adopted so the
    /// lifetime counter carries over; stale active ones are reset to Idle.
    pub fn restore(&mut self) -> RecoveryOutcome {
        let now = self.clock.now();
        let Some(snapshot) = self.load_snapshot() else {
            return RecoveryOutcome::Fresh;
        };

        if self.recovery.is_recoverable(&snapshot, now) {
            self.state = self.recovery.recover(snapshot, now);
            let progress = self.recovery.compute_recovered_progress(&self.state, now);
            log_info!(
                "Resumed pomodoro {} cycle {}/{} with {:?}ms remaining",
                self.state.phase.as_str(),
                self.state.cycle,
                self.state.total_cycles,
                progress.remaining_ms
            );
            self.persist_best_effort();
            return RecoveryOutcome::Resumed { progress };
        }

        if snapshot.phase == Phase::Idle {
            self.state = snapshot;
            return RecoveryOutcome::Fresh;
        }

        let inactive_ms = self.recovery.inactive_ms(&snapshot, now).unwrap_or(0);
        log_warn!(
            "Discarding stale pomodoro ({} cycle {}); inactive for {}ms",
            snapshot.phase.as_str(),
            snapshot.cycle,
            inactive_ms
        );
        self.state = snapshot;
        self.state.reset(now);
        self.persist_best_effort();
        RecoveryOutcome::Abandoned {
            inactive_ms,
            entry_ref: None,
        }
    }

    pub fn state(&self) -> &PomodoroState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn cycle(&self) -> u32 {
        self.state.cycle
    }

    pub fn completed_sessions(&self) -> u64 {
        self.state.completed_sessions
    }

    /// Starts cycle 1 in Work. Only valid from Idle: a running session must be
    /// `reset` first.
    pub fn start(&mut self, work_minutes: u32, break_minutes: u32, total_cycles: u32) -> Result<()> {
        self.start_with(PomodoroConfig {
            work_minutes,
            break_minutes,
            total_cycles,
        })
    }

    pub fn start_with(&mut self, config: PomodoroConfig) -> Result<()> {
        self.state.begin(config, self.clock.now())?;
        log_info!(
            "Started pomodoro: {}m work / {}m break x{}",
            config.work_minutes,
            config.break_minutes,
            config.total_cycles
        );
        self.persist_best_effort();
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        let now = self.clock.now();
        self.state.pause(now)?;
        log_debug!(
            "Paused pomodoro {} at {}ms",
            self.state.phase.as_str(),
            self.state.phase_elapsed_ms(now)
        );
        self.persist_best_effort();
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        self.state.resume(self.clock.now())?;
        log_debug!("Resumed pomodoro {}", self.state.phase.as_str());
        self.persist_best_effort();
        Ok(())
    }

    pub fn complete_phase(&mut self) -> Result<PhaseTransition> {
        let transition = self.state.complete_phase(self.clock.now())?;
        if transition.session_completed {
            log_info!(
                "Pomodoro session complete; {} completed overall",
                self.state.completed_sessions
            );
        } else {
            log_debug!(
                "Pomodoro {} -> {} (cycle {})",
                transition.from.as_str(),
                transition.to.as_str(),
                transition.cycle
            );
        }
        self.persist_best_effort();
        Ok(transition)
    }

    pub fn reset(&mut self) {
        self.state.reset(self.clock.now());
        log_debug!("Pomodoro reset");
        self.persist_best_effort();
    }

    pub fn phase_elapsed_ms(&self) -> u64 {
        self.state.phase_elapsed_ms(self.clock.now())
    }

    pub fn phase_remaining_ms(&self) -> u64 {
        self.state.phase_remaining_ms(self.clock.now())
    }

    pub fn phase_progress_percent(&self) -> f64 {
        self.state.phase_progress_percent(self.clock.now())
    }

    /// All phase reads taken at a single instant.
    pub fn reading(&self) -> PhaseReading {
        let now = self.clock.now();
        let remaining_ms = self.state.phase_remaining_ms(now);
        PhaseReading {
            phase: self.state.phase,
            cycle: self.state.cycle,
            total_cycles: self.state.total_cycles,
            elapsed_ms: self.state.phase_elapsed_ms(now),
            remaining_ms,
            progress_percent: self.state.phase_progress_percent(now),
            is_expired: self.state.phase != Phase::Idle && remaining_ms == 0,
            paused: self.state.is_paused(),
        }
    }

    pub fn persist(&self) -> anyhow::Result<()> {
        let payload =
            serde_json::to_string(&self.state).context("failed to serialize pomodoro state")?;
        self.store
            .save(&self.key, &payload)
            .with_context(|| format!("failed to save snapshot '{}'", self.key))
    }

    fn persist_best_effort(&self) {
        if let Err(err) = self.persist() {
            log_warn!("Pomodoro snapshot not persisted: {err:#}");
        }
    }

    fn load_snapshot(&self) -> Option<PomodoroState> {
        let payload = match self.store.load(&self.key) {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(err) => {
                log_warn!("Failed to load pomodoro snapshot: {err:#}");
                return None;
            }
        };

        let state: PomodoroState = match serde_json::from_str(&payload) {
            Ok(state) => state,
            Err(err) => {
                log_warn!("Ignoring unreadable pomodoro snapshot: {err}");
                return None;
            }
        };

        if let Err(err) = state.check_consistent() {
            log_warn!("Ignoring inconsistent pomodoro snapshot: {err}");
            return None;
        }
        Some(state)
    }
}
