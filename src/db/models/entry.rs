//! Tracked time entries.
//!
//! An entry is created open (no end time) when a stopwatch session starts and
//! is either finalized with a duration or deleted when the session ends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum EntryStatus {
    Open,
    Finalized,
    /// Left open by a session that went stale before it was stopped.
    Abandoned,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Open => "Open",
            EntryStatus::Finalized => "Finalized",
            EntryStatus::Abandoned => "Abandoned",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    pub category_ref: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<u64>,
    pub status: EntryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entry {
    pub fn open(id: String, category_ref: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            category_ref: category_ref.to_string(),
            started_at,
            ended_at: None,
            duration_seconds: None,
            status: EntryStatus::Open,
            created_at: started_at,
            updated_at: started_at,
        }
    }
}
