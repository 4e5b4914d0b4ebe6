use anyhow::ensure;
use serde::{Deserialize, Serialize};

use crate::{
    clock::{span_ms, Timestamp},
    error::{Result, TimerError},
    recovery::Recoverable,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
}

impl TimerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerStatus::Idle => "idle",
            TimerStatus::Running => "running",
            TimerStatus::Paused => "paused",
        }
    }
}

/// Persisted record of one open-ended stopwatch session.
///
/// While running, elapsed time is `now - started_at - accumulated_ms`; while
/// paused it is frozen at `paused_at - started_at - accumulated_ms`.
/// `accumulated_ms` only grows on resume, by the length of the pause.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionTimerState {
    pub status: TimerStatus,
    pub category_ref: Option<String>,
    pub entry_ref: Option<String>,
    pub started_at: Option<Timestamp>,
    pub paused_at: Option<Timestamp>,
    #[serde(default)]
    pub accumulated_ms: u64,
    #[serde(default)]
    pub last_active_at: Option<Timestamp>,
}

impl SessionTimerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elapsed_ms(&self, now: Timestamp) -> u64 {
        let Some(started_at) = self.started_at else {
            return 0;
        };
        let until = match (self.status, self.paused_at) {
            (TimerStatus::Idle, _) => return 0,
            (TimerStatus::Paused, Some(paused_at)) => paused_at,
            _ => now,
        };
        span_ms(started_at, until).saturating_sub(self.accumulated_ms)
    }

    pub fn begin(&mut self, category_ref: &str, entry_ref: String, now: Timestamp) -> Result<()> {
        self.require(TimerStatus::Idle, "start")?;
        *self = Self {
            status: TimerStatus::Running,
            category_ref: Some(category_ref.to_string()),
            entry_ref: Some(entry_ref),
            started_at: Some(now),
            paused_at: None,
            accumulated_ms: 0,
            last_active_at: Some(now),
        };
        Ok(())
    }

    pub fn pause(&mut self, now: Timestamp) -> Result<()> {
        self.require(TimerStatus::Running, "pause")?;
        self.status = TimerStatus::Paused;
        self.paused_at = Some(now);
        self.last_active_at = Some(now);
        Ok(())
    }

    pub fn resume(&mut self, now: Timestamp) -> Result<()> {
        self.require(TimerStatus::Paused, "resume")?;
        if let Some(paused_at) = self.paused_at.take() {
            self.accumulated_ms = self.accumulated_ms.saturating_add(span_ms(paused_at, now));
        }
        self.status = TimerStatus::Running;
        self.last_active_at = Some(now);
        Ok(())
    }

    /// Fails unless running or paused; used by stop and discard before clearing.
    pub fn require_active(&self, operation: &'static str) -> Result<()> {
        match self.status {
            TimerStatus::Running | TimerStatus::Paused => Ok(()),
            TimerStatus::Idle => Err(TimerError::invalid_state(operation, self.status.as_str())),
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Running needs a start time and no pause; paused needs both.
    pub fn check_consistent(&self) -> anyhow::Result<()> {
        match self.status {
            TimerStatus::Idle => {}
            TimerStatus::Running => {
                ensure!(self.started_at.is_some(), "running stopwatch has no start time");
                ensure!(self.paused_at.is_none(), "running stopwatch carries a pause time");
            }
            TimerStatus::Paused => {
                ensure!(self.started_at.is_some(), "paused stopwatch has no start time");
                ensure!(self.paused_at.is_some(), "paused stopwatch has no pause time");
            }
        }
        Ok(())
    }

    fn require(&self, expected: TimerStatus, operation: &'static str) -> Result<()> {
        if self.status == expected {
            Ok(())
        } else {
            Err(TimerError::invalid_state(operation, self.status.as_str()))
        }
    }
}

impl Recoverable for SessionTimerState {
    fn is_active(&self) -> bool {
        self.status != TimerStatus::Idle
    }

    fn last_active_at(&self) -> Option<Timestamp> {
        self.last_active_at
    }

    fn stamp_active(&mut self, now: Timestamp) {
        self.last_active_at = Some(now);
    }

    fn elapsed_at(&self, now: Timestamp) -> u64 {
        self.elapsed_ms(now)
    }

    fn target_ms(&self) -> Option<u64> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_at(now: Timestamp) -> SessionTimerState {
        let mut state = SessionTimerState::new();
        state.begin("focus", "entry-1".into(), now).unwrap();
        state
    }

    #[test]
    fn idle_state_reads_zero() {
        assert_eq!(SessionTimerState::new().elapsed_ms(123_456), 0);
    }

    #[test]
    fn paused_elapsed_is_frozen() {
        let mut state = running_at(0);
        state.pause(5_000).unwrap();
        assert_eq!(state.elapsed_ms(5_000), 5_000);
        assert_eq!(state.elapsed_ms(60_000), 5_000);
    }

    #[test]
    fn resume_banks_pause_length() {
        let mut state = running_at(1_000);
        state.pause(3_000).unwrap();
        state.resume(10_000).unwrap();
        assert_eq!(state.accumulated_ms, 7_000);
        assert!(state.paused_at.is_none());
        assert_eq!(state.elapsed_ms(12_000), 4_000);
    }

    #[test]
    fn zero_length_pause_changes_nothing() {
        let mut state = running_at(0);
        let before = state.elapsed_ms(2_500);
        state.pause(2_500).unwrap();
        state.resume(2_500).unwrap();
        assert_eq!(state.elapsed_ms(2_500), before);
        assert_eq!(state.accumulated_ms, 0);
    }

    #[test]
    fn invalid_transitions_leave_state_untouched() {
        let mut idle = SessionTimerState::new();
        let err = idle.resume(10).unwrap_err();
        assert!(err.is_invalid_state());
        assert_eq!(idle, SessionTimerState::new());

        let mut running = running_at(0);
        let snapshot = running.clone();
        assert!(running.begin("other", "entry-2".into(), 5).is_err());
        assert!(running.resume(5).is_err());
        assert_eq!(running, snapshot);
    }

    #[test]
    fn consistency_follows_status() {
        let mut state = running_at(0);
        assert!(state.check_consistent().is_ok());
        state.pause(1_000).unwrap();
        assert!(state.check_consistent().is_ok());

        let mut no_pause_time = state.clone();
        no_pause_time.paused_at = None;
        assert!(no_pause_time.check_consistent().is_err());

        let never_started = SessionTimerState {
            status: TimerStatus::Running,
            ..SessionTimerState::new()
        };
        assert!(never_started.check_consistent().is_err());
        assert!(SessionTimerState::new().check_consistent().is_ok());
    }

    #[test]
    fn serializes_enums_as_strings_and_timestamps_as_integers() {
        let state = running_at(1_700_000_000_000);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["status"], "running");
        assert_eq!(json["startedAt"], 1_700_000_000_000_i64);
        assert_eq!(json["accumulatedMs"], 0);
        assert!(json["pausedAt"].is_null());
    }
}
