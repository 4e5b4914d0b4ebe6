use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    clock::{to_datetime, Clock},
    error::{Result, TimerError},
    recovery::{RecoveryManager, RecoveryOutcome},
    store::{EntryRepository, SnapshotStore},
};

use super::{SessionTimerState, TimerStatus};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

pub const SESSION_TIMER_KEY: &str = "sessionTimer";

/// Result of `SessionTimer::stop`. The caller writes it back with
/// `EntryRepository::finalize_entry`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoppedEntry {
    pub entry_ref: Option<String>,
    pub category_ref: Option<String>,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: u64,
}

/// Open-ended stopwatch over one tracked entry.
///
/// Every mutation is persisted to the snapshot store before returning.
/// Persistence is best-effort: a failed write is logged and the in-memory
/// state stays authoritative. Call `persist` where a write must succeed.
pub struct SessionTimer {
    state: SessionTimerState,
    clock: Arc<dyn Clock>,
    store: Arc<dyn SnapshotStore>,
    entries: Arc<dyn EntryRepository>,
    recovery: RecoveryManager,
    key: String,
}

impl SessionTimer {
    pub fn new(
        clock: Arc<dyn Clock>,
        store: Arc<dyn SnapshotStore>,
        entries: Arc<dyn EntryRepository>,
    ) -> Self {
        Self {
            state: SessionTimerState::new(),
            clock,
            store,
            entries,
            recovery: RecoveryManager::default(),
            key: SESSION_TIMER_KEY.to_string(),
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

    /// Loads the persisted snapshot. A recoverable session is resumed as-is;
    /// a stale one is cleared back to Idle and reported as abandoned.
    pub fn restore(&mut self) -> RecoveryOutcome {
        let now = self.clock.now();
        let Some(snapshot) = self.load_snapshot() else {
            return RecoveryOutcome::Fresh;
        };

        if self.recovery.is_recoverable(&snapshot, now) {
            self.state = self.recovery.recover(snapshot, now);
            let progress = self.recovery.compute_recovered_progress(&self.state, now);
            log_info!(
                "Resumed {} stopwatch for entry {:?} at {}ms",
                self.state.status.as_str(),
                self.state.entry_ref,
                progress.elapsed_ms
            );
            self.persist_best_effort();
            return RecoveryOutcome::Resumed { progress };
        }

        if snapshot.status == TimerStatus::Idle {
            self.state = SessionTimerState::new();
            return RecoveryOutcome::Fresh;
        }

        let inactive_ms = self.recovery.inactive_ms(&snapshot, now).unwrap_or(0);
        log_warn!(
            "Discarding stale stopwatch for entry {:?}; inactive for {}ms",
            snapshot.entry_ref,
            inactive_ms
        );
        self.state = SessionTimerState::new();
        self.persist_best_effort();
        RecoveryOutcome::Abandoned {
            inactive_ms,
            entry_ref: snapshot.entry_ref,
        }
    }

    pub fn state(&self) -> &SessionTimerState {
        &self.state
    }

    pub fn status(&self) -> TimerStatus {
        self.state.status
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.state.elapsed_ms(self.clock.now())
    }

    /// Starts tracking `category_ref` and returns the id of the open entry
    /// created for it. If entry creation fails the timer stays Idle.
    pub fn start(&mut self, category_ref: &str) -> Result<String> {
        if self.state.status != TimerStatus::Idle {
            return Err(TimerError::invalid_state("start", self.state.status.as_str()));
        }

        let now = self.clock.now();
        let entry_ref = self
            .entries
            .create_open_entry(category_ref, to_datetime(now))
            .map_err(TimerError::Entry)?;

        self.state.begin(category_ref, entry_ref.clone(), now)?;
        log_info!("Started stopwatch for {} (entry {})", category_ref, entry_ref);
        self.persist_best_effort();
        Ok(entry_ref)
    }

    pub fn pause(&mut self) -> Result<()> {
        let now = self.clock.now();
        self.state.pause(now)?;
        log_debug!("Paused stopwatch at {}ms", self.state.elapsed_ms(now));
        self.persist_best_effort();
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        let now = self.clock.now();
        self.state.resume(now)?;
        log_debug!("Resumed stopwatch; {}ms banked", self.state.accumulated_ms);
        self.persist_best_effort();
        Ok(())
    }

    pub fn stop(&mut self) -> Result<StoppedEntry> {
        self.state.require_active("stop")?;

        let now = self.clock.now();
        let elapsed_ms = self.state.elapsed_ms(now);
        let stopped = StoppedEntry {
            entry_ref: self.state.entry_ref.take(),
            category_ref: self.state.category_ref.take(),
            ended_at: to_datetime(now),
            duration_seconds: elapsed_ms / 1000,
        };

        self.state.clear();
        log_info!(
            "Stopped stopwatch for entry {:?} after {}s",
            stopped.entry_ref,
            stopped.duration_seconds
        );
        self.persist_best_effort();
        Ok(stopped)
    }

    /// Ends the session without a duration. Returns the entry the caller
    /// should delete.
    pub fn discard(&mut self) -> Result<Option<String>> {
        self.state.require_active("discard")?;

        let entry_ref = self.state.entry_ref.take();
        self.state.clear();
        log_info!("Discarded stopwatch entry {:?}", entry_ref);
        self.persist_best_effort();
        Ok(entry_ref)
    }

    /// Writes the current state to the snapshot store, surfacing any error.
    pub fn persist(&self) -> anyhow::Result<()> {
        let payload =
            serde_json::to_string(&self.state).context("failed to serialize stopwatch state")?;
        self.store
            .save(&self.key, &payload)
            .with_context(|| format!("failed to save snapshot '{}'", self.key))
    }

    fn persist_best_effort(&self) {
        if let Err(err) = self.persist() {
            log_warn!("Stopwatch snapshot not persisted: {err:#}");
        }
    }

    fn load_snapshot(&self) -> Option<SessionTimerState> {
        let payload = match self.store.load(&self.key) {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(err) => {
                log_warn!("Failed to load stopwatch snapshot: {err:#}");
                return None;
            }
        };

        let state: SessionTimerState = match serde_json::from_str(&payload) {
            Ok(state) => state,
            Err(err) => {
                log_warn!("Ignoring unreadable stopwatch snapshot: {err}");
                return None;
            }
        };

        if let Err(err) = state.check_consistent() {
            log_warn!("Ignoring inconsistent stopwatch snapshot: {err}");
            return None;
        }
        Some(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        db::EntryStatus,
        recovery::STALE_TIMEOUT_MS,
        store::MemoryStore,
    };

    struct Harness {
        clock: ManualClock,
        store: Arc<MemoryStore>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                clock: ManualClock::new(0),
                store: Arc::new(MemoryStore::new()),
            }
        }

        fn timer(&self) -> SessionTimer {
            SessionTimer::new(
                Arc::new(self.clock.clone()),
                self.store.clone(),
                self.store.clone(),
            )
        }

        fn persisted(&self) -> SessionTimerState {
            let payload = self.store.load(SESSION_TIMER_KEY).unwrap().unwrap();
            serde_json::from_str(&payload).unwrap()
        }
    }

    struct FailingStore;

    impl SnapshotStore for FailingStore {
        fn save(&self, _key: &str, _payload: &str) -> anyhow::Result<()> {
            anyhow::bail!("disk unavailable")
        }
        fn load(&self, _key: &str) -> anyhow::Result<Option<String>> {
            anyhow::bail!("disk unavailable")
        }
        fn remove(&self, _key: &str) -> anyhow::Result<()> {
            anyhow::bail!("disk unavailable")
        }
    }

    impl EntryRepository for FailingStore {
        fn create_open_entry(
            &self,
            _category_ref: &str,
            _started_at: DateTime<Utc>,
        ) -> anyhow::Result<String> {
            anyhow::bail!("offline")
        }
        fn finalize_entry(&self, _: &str, _: DateTime<Utc>, _: u64) -> anyhow::Result<()> {
            anyhow::bail!("offline")
        }
        fn delete_entry(&self, _: &str) -> anyhow::Result<()> {
            anyhow::bail!("offline")
        }
    }

    #[test]
    fn basic_stopwatch_scenario() {
        let h = Harness::new();
        let mut timer = h.timer();

        let entry_ref = timer.start("deep-work").unwrap();
        h.clock.advance(5_000);
        assert_eq!(timer.elapsed_ms(), 5_000);

        timer.pause().unwrap();
        h.clock.advance(4_000);
        assert_eq!(timer.elapsed_ms(), 5_000);

        timer.resume().unwrap();
        h.clock.advance(2_000);
        assert_eq!(timer.elapsed_ms(), 7_000);

        let stopped = timer.stop().unwrap();
        assert_eq!(stopped.duration_seconds, 7);
        assert_eq!(stopped.entry_ref.as_deref(), Some(entry_ref.as_str()));
        assert_eq!(stopped.category_ref.as_deref(), Some("deep-work"));
        assert_eq!(stopped.ended_at.timestamp_millis(), 11_000);
        assert_eq!(timer.status(), TimerStatus::Idle);
        assert_eq!(timer.elapsed_ms(), 0);
    }

    #[test]
    fn start_creates_open_entry() {
        let h = Harness::new();
        h.clock.set(1_700_000_000_000);
        let mut timer = h.timer();
        let entry_ref = timer.start("reading").unwrap();

        let entry = h.store.entry(&entry_ref).unwrap();
        assert_eq!(entry.status, EntryStatus::Open);
        assert_eq!(entry.category_ref, "reading");
        assert_eq!(entry.started_at.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn stop_floors_partial_seconds() {
        let h = Harness::new();
        let mut timer = h.timer();
        timer.start("focus").unwrap();
        h.clock.advance(2_999);
        assert_eq!(timer.stop().unwrap().duration_seconds, 2);
    }

    #[test]
    fn stop_while_paused_uses_frozen_elapsed() {
        let h = Harness::new();
        let mut timer = h.timer();
        timer.start("focus").unwrap();
        h.clock.advance(3_000);
        timer.pause().unwrap();
        h.clock.advance(120_000);
        assert_eq!(timer.stop().unwrap().duration_seconds, 3);
    }

    #[test]
    fn discard_returns_entry_to_delete() {
        let h = Harness::new();
        let mut timer = h.timer();
        let entry_ref = timer.start("focus").unwrap();
        h.clock.advance(1_000);
        assert_eq!(timer.discard().unwrap(), Some(entry_ref));
        assert_eq!(timer.status(), TimerStatus::Idle);
        assert_eq!(h.persisted(), SessionTimerState::new());
    }

    #[test]
    fn invalid_transitions_are_rejected_without_side_effects() {
        let h = Harness::new();
        let mut timer = h.timer();

        assert!(timer.resume().unwrap_err().is_invalid_state());
        assert!(timer.pause().unwrap_err().is_invalid_state());
        assert!(timer.stop().unwrap_err().is_invalid_state());
        assert!(timer.discard().unwrap_err().is_invalid_state());
        assert_eq!(timer.state(), &SessionTimerState::new());

        timer.start("focus").unwrap();
        let before = timer.state().clone();
        assert!(timer.start("again").unwrap_err().is_invalid_state());
        assert_eq!(timer.state(), &before);
        assert_eq!(h.store.entries().len(), 1);
    }

    #[test]
    fn every_mutation_is_persisted() {
        let h = Harness::new();
        let mut timer = h.timer();

        timer.start("focus").unwrap();
        assert_eq!(h.persisted().status, TimerStatus::Running);

        h.clock.advance(1_000);
        timer.pause().unwrap();
        assert_eq!(h.persisted().paused_at, Some(1_000));

        h.clock.advance(500);
        timer.resume().unwrap();
        assert_eq!(h.persisted().accumulated_ms, 500);

        timer.stop().unwrap();
        assert_eq!(h.persisted().status, TimerStatus::Idle);
    }

    #[test]
    fn entry_failure_keeps_timer_idle() {
        let clock = ManualClock::new(0);
        let failing = Arc::new(FailingStore);
        let mut timer = SessionTimer::new(Arc::new(clock), failing.clone(), failing);

        let err = timer.start("focus").unwrap_err();
        assert!(matches!(err, TimerError::Entry(_)));
        assert_eq!(timer.status(), TimerStatus::Idle);
    }

    #[test]
    fn snapshot_failures_do_not_block_transitions() {
        let clock = ManualClock::new(0);
        let memory = Arc::new(MemoryStore::new());
        let mut timer = SessionTimer::new(Arc::new(clock.clone()), Arc::new(FailingStore), memory);

        timer.start("focus").unwrap();
        clock.advance(1_500);
        timer.pause().unwrap();
        assert!(timer.persist().is_err());
        assert_eq!(timer.elapsed_ms(), 1_500);
        assert_eq!(timer.restore(), RecoveryOutcome::Fresh);
    }

    #[test]
    fn restore_resumes_running_session_without_double_counting() {
        let h = Harness::new();
        let mut timer = h.timer();
        timer.start("focus").unwrap();
        h.clock.advance(10_000);
        timer.pause().unwrap();
        h.clock.advance(5_000);
        timer.resume().unwrap();
        drop(timer);

        // Process gone for an hour while running.
        h.clock.advance(3_600_000);
        let mut restored = h.timer();
        let outcome = restored.restore();

        let expected = 10_000 + 3_600_000;
        match outcome {
            RecoveryOutcome::Resumed { progress } => {
                assert_eq!(progress.elapsed_ms, expected);
                assert_eq!(progress.remaining_ms, None);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(restored.elapsed_ms(), expected);
        assert_eq!(restored.status(), TimerStatus::Running);
        assert_eq!(h.persisted().last_active_at, Some(h.clock.now()));
    }

    #[test]
    fn restore_abandons_stale_session() {
        let h = Harness::new();
        let mut timer = h.timer();
        let entry_ref = timer.start("focus").unwrap();
        drop(timer);

        h.clock.advance(STALE_TIMEOUT_MS as i64 + 1);
        let mut restored = h.timer();
        let outcome = restored.restore();

        assert_eq!(
            outcome,
            RecoveryOutcome::Abandoned {
                inactive_ms: STALE_TIMEOUT_MS + 1,
                entry_ref: Some(entry_ref),
            }
        );
        assert_eq!(restored.status(), TimerStatus::Idle);
        assert_eq!(h.persisted(), SessionTimerState::new());
    }

    #[test]
    fn restore_ignores_garbage_snapshot() {
        let h = Harness::new();
        h.store.save(SESSION_TIMER_KEY, "not json").unwrap();
        let mut timer = h.timer();
        assert_eq!(timer.restore(), RecoveryOutcome::Fresh);
        assert_eq!(timer.status(), TimerStatus::Idle);
    }

    #[test]
    fn restore_keeps_paused_session_frozen() {
        let h = Harness::new();
        let mut timer = h.timer();
        timer.start("focus").unwrap();
        h.clock.advance(42_000);
        timer.pause().unwrap();
        drop(timer);

        h.clock.advance(6 * 3_600_000);
        let mut restored = h.timer();
        match restored.restore() {
            RecoveryOutcome::Resumed { progress } => assert_eq!(progress.elapsed_ms, 42_000),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(restored.status(), TimerStatus::Paused);
        assert_eq!(restored.elapsed_ms(), 42_000);

        restored.resume().unwrap();
        h.clock.advance(3_000);
        assert_eq!(restored.elapsed_ms(), 45_000);
    }

    #[test]
    fn restore_ignores_running_snapshot_without_start() {
        let h = Harness::new();
        h.store
            .save(
                SESSION_TIMER_KEY,
                r#"{"status":"running","categoryRef":"focus","entryRef":"e-1",
                    "startedAt":null,"pausedAt":null,"accumulatedMs":0,"lastActiveAt":0}"#,
            )
            .unwrap();
        h.clock.advance(60_000);

        let mut timer = h.timer();
        assert_eq!(timer.restore(), RecoveryOutcome::Fresh);
        assert_eq!(timer.status(), TimerStatus::Idle);
        assert_eq!(timer.elapsed_ms(), 0);
        assert!(timer.start("focus").is_ok());
    }

    #[test]
    fn custom_key_isolates_snapshots() {
        let h = Harness::new();
        let mut timer = h.timer().with_key("secondary");
        timer.start("focus").unwrap();
        assert!(h.store.load(SESSION_TIMER_KEY).unwrap().is_none());
        assert!(h.store.load("secondary").unwrap().is_some());
    }
}
