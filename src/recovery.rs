//! Staleness checks and progress reconstruction for persisted sessions.
//!
//! Recovered progress uses the same timestamp formula as the live reads.
//! `last_active_at` only decides whether a snapshot may be resumed; it never
//! adds or removes elapsed time.

use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;

/// Snapshots older than this (measured from `last_active_at`) are abandoned.
pub const STALE_TIMEOUT_MS: u64 = 24 * 60 * 60 * 1000;

/// A persisted session record the recovery rules can be applied to.
pub trait Recoverable {
    /// True unless the record is Idle.
    fn is_active(&self) -> bool;
    fn last_active_at(&self) -> Option<Timestamp>;
    fn stamp_active(&mut self, now: Timestamp);
    /// Elapsed time at `now`, exactly as the live read computes it.
    fn elapsed_at(&self, now: Timestamp) -> u64;
    /// Target duration of the current interval; `None` when open-ended.
    fn target_ms(&self) -> Option<u64>;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecoveredProgress {
    pub elapsed_ms: u64,
    /// `None` for open-ended sessions.
    pub remaining_ms: Option<u64>,
    pub is_expired: bool,
}

/// What happened when an engine loaded its persisted snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Nothing active was persisted (or it could not be read).
    Fresh,
    Resumed { progress: RecoveredProgress },
    /// The snapshot was older than the stale timeout and has been reset to
    /// Idle. The host should tell the user; `entry_ref` names an open entry the
    /// stopwatch left behind, if any.
    Abandoned {
        inactive_ms: u64,
        entry_ref: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryManager {
    stale_timeout_ms: u64,
}

impl Default for RecoveryManager {
    fn default() -> Self {
        Self {
            stale_timeout_ms: STALE_TIMEOUT_MS,
        }
    }
}

impl RecoveryManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(stale_timeout_ms: u64) -> Self {
        Self { stale_timeout_ms }
    }

    pub fn stale_timeout_ms(&self) -> u64 {
        self.stale_timeout_ms
    }

    /// Milliseconds since the snapshot was last touched. A snapshot stamped in
    /// the future (clock moved backwards) counts as zero.
    pub fn inactive_ms<S: Recoverable>(&self, snapshot: &S, now: Timestamp) -> Option<u64> {
        snapshot
            .last_active_at()
            .map(|last| crate::clock::span_ms(last, now))
    }

    pub fn is_recoverable<S: Recoverable>(&self, snapshot: &S, now: Timestamp) -> bool {
        if !snapshot.is_active() {
            return false;
        }
        match self.inactive_ms(snapshot, now) {
            Some(inactive) => inactive < self.stale_timeout_ms,
            None => false,
        }
    }

    /// Marks the snapshot as active at `now`. Phase clock fields are untouched.
    pub fn recover<S: Recoverable>(&self, mut snapshot: S, now: Timestamp) -> S {
        snapshot.stamp_active(now);
        snapshot
    }

    pub fn compute_recovered_progress<S: Recoverable>(
        &self,
        snapshot: &S,
        now: Timestamp,
    ) -> RecoveredProgress {
        let elapsed_ms = snapshot.elapsed_at(now);
        match snapshot.target_ms() {
            Some(target_ms) => RecoveredProgress {
                elapsed_ms,
                remaining_ms: Some(target_ms.saturating_sub(elapsed_ms)),
                is_expired: elapsed_ms >= target_ms,
            },
            None => RecoveredProgress {
                elapsed_ms,
                remaining_ms: None,
                is_expired: false,
            },
        }
    }
}
