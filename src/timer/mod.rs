pub mod controller;
pub mod state;

pub use controller::{SessionTimer, StoppedEntry, SESSION_TIMER_KEY};
pub use state::{SessionTimerState, TimerStatus};
