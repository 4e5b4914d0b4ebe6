use anyhow::ensure;
use serde::{Deserialize, Serialize};

use crate::{
    clock::{span_ms, Timestamp},
    error::{Result, TimerError},
    recovery::Recoverable,
};

const MS_PER_MINUTE: u64 = 60_000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    #[default]
    Idle,
    Work,
    Break,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Work => "work",
            Phase::Break => "break",
        }
    }
}

/// Durations and cycle count fixed for one Pomodoro session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroConfig {
    pub work_minutes: u32,
    pub break_minutes: u32,
    pub total_cycles: u32,
}

impl PomodoroConfig {
    pub fn validate(&self) -> Result<()> {
        if self.total_cycles == 0 {
            return Err(TimerError::InvalidConfig(
                "total_cycles must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Emitted by `complete_phase`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTransition {
    pub from: Phase,
    pub to: Phase,
    /// Cycle after the transition; 0 once the session has finished.
    pub cycle: u32,
    pub session_completed: bool,
}

/// Persisted Pomodoro record. The clock fields (`started_at`, `paused_at`,
/// `accumulated_ms`) describe the current phase only and restart on every
/// transition. `completed_sessions` is a lifetime counter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroState {
    pub phase: Phase,
    pub cycle: u32,
    pub total_cycles: u32,
    pub work_minutes: u32,
    pub break_minutes: u32,
    pub started_at: Option<Timestamp>,
    pub paused_at: Option<Timestamp>,
    #[serde(default)]
    pub accumulated_ms: u64,
    #[serde(default)]
    pub last_active_at: Option<Timestamp>,
    #[serde(default)]
    pub completed_sessions: u64,
}

impl PomodoroState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn config(&self) -> PomodoroConfig {
        PomodoroConfig {
            work_minutes: self.work_minutes,
            break_minutes: self.break_minutes,
            total_cycles: self.total_cycles,
        }
    }

    /// Name used in error messages.
    pub fn state_name(&self) -> &'static str {
        if self.phase != Phase::Idle && self.is_paused() {
            "paused"
        } else {
            self.phase.as_str()
        }
    }

    pub fn target_ms(&self) -> u64 {
        let minutes = match self.phase {
            Phase::Idle => 0,
            Phase::Work => self.work_minutes,
            Phase::Break => self.break_minutes,
        };
        u64::from(minutes) * MS_PER_MINUTE
    }

    pub fn phase_elapsed_ms(&self, now: Timestamp) -> u64 {
        if self.phase == Phase::Idle {
            return 0;
        }
        let Some(started_at) = self.started_at else {
            return 0;
        };
        let until = self.paused_at.unwrap_or(now);
        span_ms(started_at, until).saturating_sub(self.accumulated_ms)
    }

    pub fn phase_remaining_ms(&self, now: Timestamp) -> u64 {
        self.target_ms()
            .saturating_sub(self.phase_elapsed_ms(now))
    }

    /// Share of the phase target already elapsed, in `[0, 100]`. A zero-length
    /// phase reads as complete.
    pub fn phase_progress_percent(&self, now: Timestamp) -> f64 {
        if self.phase == Phase::Idle {
            return 0.0;
        }
        let target = self.target_ms();
        if target == 0 {
            return 100.0;
        }
        let percent = 100.0 * self.phase_elapsed_ms(now) as f64 / target as f64;
        percent.clamp(0.0, 100.0)
    }

    pub fn begin(&mut self, config: PomodoroConfig, now: Timestamp) -> Result<()> {
        if self.phase != Phase::Idle {
            return Err(TimerError::invalid_state("start", self.state_name()));
        }
        config.validate()?;

        *self = Self {
            phase: Phase::Work,
            cycle: 1,
            total_cycles: config.total_cycles,
            work_minutes: config.work_minutes,
            break_minutes: config.break_minutes,
            started_at: Some(now),
            paused_at: None,
            accumulated_ms: 0,
            last_active_at: Some(now),
            completed_sessions: self.completed_sessions,
        };
        Ok(())
    }

    pub fn pause(&mut self, now: Timestamp) -> Result<()> {
        if self.phase == Phase::Idle || self.is_paused() {
            return Err(TimerError::invalid_state("pause", self.state_name()));
        }
        self.paused_at = Some(now);
        self.last_active_at = Some(now);
        Ok(())
    }

    pub fn resume(&mut self, now: Timestamp) -> Result<()> {
        let Some(paused_at) = self.paused_at.filter(|_| self.phase != Phase::Idle) else {
            return Err(TimerError::invalid_state("resume", self.state_name()));
        };
        self.accumulated_ms = self.accumulated_ms.saturating_add(span_ms(paused_at, now));
        self.paused_at = None;
        self.last_active_at = Some(now);
        Ok(())
    }

    /// Advances Work -> Break -> Work ... and back to Idle after the last
    /// break. Allowed while paused; the new phase starts unpaused.
    pub fn complete_phase(&mut self, now: Timestamp) -> Result<PhaseTransition> {
        let from = self.phase;
        let (to, cycle) = match from {
            Phase::Idle => {
                return Err(TimerError::invalid_state("complete phase", self.state_name()))
            }
            Phase::Work => (Phase::Break, self.cycle),
            Phase::Break if self.cycle < self.total_cycles => (Phase::Work, self.cycle + 1),
            Phase::Break => (Phase::Idle, 0),
        };

        let session_completed = to == Phase::Idle;
        if session_completed {
            self.completed_sessions = self.completed_sessions.saturating_add(1);
        }

        self.phase = to;
        self.cycle = cycle;
        self.started_at = Some(now);
        self.paused_at = None;
        self.accumulated_ms = 0;
        self.last_active_at = Some(now);

        Ok(PhaseTransition {
            from,
            to,
            cycle,
            session_completed,
        })
    }

    /// Rejects records no sequence of transitions can produce: Idle iff cycle
    /// 0, cycle within `total_cycles`, and an active phase has a start time.
    pub fn check_consistent(&self) -> anyhow::Result<()> {
        let idle = self.phase == Phase::Idle;
        ensure!(
            idle == (self.cycle == 0),
            "phase {} does not match cycle {}",
            self.phase.as_str(),
            self.cycle
        );
        ensure!(
            self.cycle <= self.total_cycles,
            "cycle {} exceeds total cycles {}",
            self.cycle,
            self.total_cycles
        );
        if idle {
            ensure!(self.paused_at.is_none(), "idle record carries a pause time");
        } else {
            ensure!(self.started_at.is_some(), "active phase has no start time");
        }
        Ok(())
    }

    /// Back to Idle from anywhere. Keeps `completed_sessions` and the last
    /// configured durations.
    pub fn reset(&mut self, now: Timestamp) {
        self.phase = Phase::Idle;
        self.cycle = 0;
        self.started_at = None;
        self.paused_at = None;
        self.accumulated_ms = 0;
        self.last_active_at = Some(now);
    }
}

impl Recoverable for PomodoroState {
    fn is_active(&self) -> bool {
        self.phase != Phase::Idle
    }

    fn last_active_at(&self) -> Option<Timestamp> {
        self.last_active_at
    }

    fn stamp_active(&mut self, now: Timestamp) {
        self.last_active_at = Some(now);
    }

    fn elapsed_at(&self, now: Timestamp) -> u64 {
        self.phase_elapsed_ms(now)
    }

    fn target_ms(&self) -> Option<u64> {
        match self.phase {
            Phase::Idle => None,
            _ => Some(PomodoroState::target_ms(self)),
        }
    }
}
