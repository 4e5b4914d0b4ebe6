//! Wall-clock source used for all elapsed-time math.
//!
//! Timestamps are Unix epoch milliseconds. The clock must keep advancing while
//! the host process is suspended, so it reads wall time instead of a process
//! counter like `Instant`.

use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

use chrono::{DateTime, TimeZone, Utc};

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

pub trait Clock: Send + Sync {
    /// Current time. Never lower than a previously returned value.
    fn now(&self) -> Timestamp;
}

/// Reads `Utc::now()`, clamped so a backwards wall-clock step never yields a
/// smaller timestamp than one already handed out.
#[derive(Debug, Default)]
pub struct SystemClock {
    last: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let wall = Utc::now().timestamp_millis();
        let previous = self.last.fetch_max(wall, Ordering::AcqRel);
        previous.max(wall)
    }
}

/// Hand-driven clock for tests and simulations. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start)),
        }
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now.fetch_add(delta_ms.max(0), Ordering::AcqRel);
    }

    /// Jumps to `ts`. Ignored if it would move the clock backwards.
    pub fn set(&self, ts: Timestamp) {
        self.now.fetch_max(ts, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::Acquire)
    }
}

/// Converts to a `DateTime`. Timestamps outside chrono's representable
/// range (hundreds of thousands of years out) map to the Unix epoch.
pub fn to_datetime(ts: Timestamp) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ts)
        .single()
        .unwrap_or_default()
}

/// Duration between two timestamps, floored at zero.
pub(crate) fn span_ms(from: Timestamp, to: Timestamp) -> u64 {
    u64::try_from(to.saturating_sub(from)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(1_000);
        let handle = clock.clone();
        handle.advance(250);
        assert_eq!(clock.now(), 1_250);
    }

    #[test]
    fn manual_clock_never_goes_backwards() {
        let clock = ManualClock::new(5_000);
        clock.set(4_000);
        clock.advance(-100);
        assert_eq!(clock.now(), 5_000);
    }

    #[test]
    fn system_clock_is_non_decreasing() {
        let clock = SystemClock::new();
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
        assert!(first > 1_600_000_000_000);
    }

    #[test]
    fn span_is_floored_at_zero() {
        assert_eq!(span_ms(10, 4), 0);
        assert_eq!(span_ms(4, 10), 6);
    }

    #[test]
    fn datetime_conversion_keeps_millis() {
        let dt = to_datetime(1_700_000_000_123);
        assert_eq!(dt.timestamp_millis(), 1_700_000_000_123);
    }

    #[test]
    fn out_of_range_datetime_falls_back_to_epoch() {
        assert_eq!(to_datetime(i64::MAX).timestamp_millis(), 0);
        assert_eq!(to_datetime(i64::MIN).timestamp_millis(), 0);
    }
}
