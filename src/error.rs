//! Error types for session and phase operations.

/// Errors returned by the stopwatch and Pomodoro engines.
///
/// `InvalidState` is a caller bug: the operation was refused and the engine
/// state is exactly what it was before the call.
#[derive(Debug, thiserror::Error)]
pub enum TimerError {
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("entry repository failed: {0:#}")]
    Entry(#[source] anyhow::Error),
}

impl TimerError {
    pub(crate) fn invalid_state(operation: &'static str, state: &'static str) -> Self {
        TimerError::InvalidState { operation, state }
    }

    pub fn is_invalid_state(&self) -> bool {
        matches!(self, TimerError::InvalidState { .. })
    }
}

pub type Result<T, E = TimerError> = std::result::Result<T, E>;
