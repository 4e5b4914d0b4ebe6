//! Collaborator interfaces the engines persist through, plus an in-memory
//! implementation of both.

mod file;

pub use file::JsonFileStore;

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::models::{Entry, EntryStatus};

/// Key-value store that survives reloads. Values are JSON snapshots.
pub trait SnapshotStore: Send + Sync {
    fn save(&self, key: &str, payload: &str) -> Result<()>;
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Record store for tracked time entries.
pub trait EntryRepository: Send + Sync {
    /// Creates an entry with no end time and returns its id.
    fn create_open_entry(&self, category_ref: &str, started_at: DateTime<Utc>) -> Result<String>;
    fn finalize_entry(
        &self,
        entry_ref: &str,
        ended_at: DateTime<Utc>,
        duration_seconds: u64,
    ) -> Result<()>;
    fn delete_entry(&self, entry_ref: &str) -> Result<()>;
}

#[derive(Default)]
struct MemoryState {
    snapshots: HashMap<String, String>,
    entries: HashMap<String, Entry>,
}

/// Process-local store. Nothing survives the process; useful for tests and
/// hosts that only need in-session state.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn entry(&self, entry_ref: &str) -> Option<Entry> {
        self.lock().entries.get(entry_ref).cloned()
    }

    pub fn entries(&self) -> Vec<Entry> {
        let mut entries: Vec<Entry> = self.lock().entries.values().cloned().collect();
        entries.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        entries
    }
}

impl SnapshotStore for MemoryStore {
    fn save(&self, key: &str, payload: &str) -> Result<()> {
        self.lock()
            .snapshots
            .insert(key.to_string(), payload.to_string());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().snapshots.get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock().snapshots.remove(key);
        Ok(())
    }
}

impl EntryRepository for MemoryStore {
    fn create_open_entry(&self, category_ref: &str, started_at: DateTime<Utc>) -> Result<String> {
        let entry = Entry::open(Uuid::new_v4().to_string(), category_ref, started_at);
        let id = entry.id.clone();
        self.lock().entries.insert(id.clone(), entry);
        Ok(id)
    }

    fn finalize_entry(
        &self,
        entry_ref: &str,
        ended_at: DateTime<Utc>,
        duration_seconds: u64,
    ) -> Result<()> {
        let mut state = self.lock();
        let entry = state
            .entries
            .get_mut(entry_ref)
            .ok_or_else(|| anyhow!("entry {entry_ref} not found"))?;
        entry.ended_at = Some(ended_at);
        entry.duration_seconds = Some(duration_seconds);
        entry.status = EntryStatus::Finalized;
        entry.updated_at = ended_at;
        Ok(())
    }

    fn delete_entry(&self, entry_ref: &str) -> Result<()> {
        self.lock().entries.remove(entry_ref);
        Ok(())
    }
}
