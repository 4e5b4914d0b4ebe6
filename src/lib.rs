//! Timing core for a personal time tracker: an open-ended stopwatch, a
//! work/break Pomodoro engine, and recovery of both across reloads.
//!
//! Elapsed time is always derived from wall-clock timestamps
//! (`now - started_at - accumulated_ms`), never from counted ticks, so a host
//! that stops polling while backgrounded reads the right value on its next
//! poll. Neither engine runs a timer of its own.

pub mod clock;
pub mod db;
pub mod error;
pub mod pomodoro;
pub mod recovery;
pub mod settings;
pub mod store;
pub mod timer;
mod utils;
pub mod visibility;

pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use db::{Database, Entry, EntryStatus};
pub use error::{Result, TimerError};
pub use pomodoro::{
    Phase, PhaseReading, PhaseTransition, PomodoroConfig, PomodoroEngine, PomodoroState,
};
pub use recovery::{
    Recoverable, RecoveredProgress, RecoveryManager, RecoveryOutcome, STALE_TIMEOUT_MS,
};
pub use settings::{PomodoroSettings, SettingsStore};
pub use store::{EntryRepository, JsonFileStore, MemoryStore, SnapshotStore};
pub use timer::{SessionTimer, SessionTimerState, StoppedEntry, TimerStatus};
pub use utils::init_logging;
pub use visibility::{Visibility, VisibilityTracker};
