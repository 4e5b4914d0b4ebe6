pub mod engine;
pub mod state;

pub use engine::{PhaseReading, PomodoroEngine, POMODORO_KEY};
pub use state::{Phase, PhaseTransition, PomodoroConfig, PomodoroState};
