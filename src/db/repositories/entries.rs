use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_optional_datetime, parse_status, to_i64, to_u64},
    models::{Entry, EntryStatus},
};
use crate::store::EntryRepository;

const ENTRY_COLUMNS: &str =
    "id, category_ref, started_at, ended_at, duration_seconds, status, created_at, updated_at";

fn row_to_entry(row: &Row) -> Result<Entry> {
    let started_at: String = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    let duration_seconds: Option<i64> = row.get("duration_seconds")?;
    let status: String = row.get("status")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Entry {
        id: row.get("id")?,
        category_ref: row.get("category_ref")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        ended_at: parse_optional_datetime(ended_at, "ended_at")?,
        duration_seconds: duration_seconds
            .map(|value| to_u64(value, "duration_seconds"))
            .transpose()?,
        status: parse_status(&status)?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn insert_entry(conn: &Connection, entry: &Entry) -> Result<()> {
    conn.execute(
        "INSERT INTO entries (id, category_ref, started_at, ended_at, duration_seconds, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            entry.id,
            entry.category_ref,
            entry.started_at.to_rfc3339(),
            entry.ended_at.as_ref().map(|dt| dt.to_rfc3339()),
            entry.duration_seconds.map(to_i64).transpose()?,
            entry.status.as_str(),
            entry.created_at.to_rfc3339(),
            entry.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn finalize_entry(
    conn: &Connection,
    entry_id: &str,
    ended_at: DateTime<Utc>,
    duration_seconds: u64,
) -> Result<()> {
    let rows_affected = conn.execute(
        "UPDATE entries
         SET ended_at = ?1,
             duration_seconds = ?2,
             status = ?3,
             updated_at = ?4
         WHERE id = ?5 AND status = 'Open'",
        params![
            ended_at.to_rfc3339(),
            to_i64(duration_seconds)?,
            EntryStatus::Finalized.as_str(),
            ended_at.to_rfc3339(),
            entry_id,
        ],
    )?;

    if rows_affected == 0 {
        return Err(anyhow!("open entry {entry_id} not found"));
    }
    Ok(())
}

fn delete_entry(conn: &Connection, entry_id: &str) -> Result<()> {
    conn.execute("DELETE FROM entries WHERE id = ?1", params![entry_id])?;
    Ok(())
}

fn query_entries(conn: &Connection, sql: &str, args: impl rusqlite::Params) -> Result<Vec<Entry>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(args)?;
    let mut entries = Vec::new();
    while let Some(row) = rows.next()? {
        entries.push(row_to_entry(row)?);
    }
    Ok(entries)
}

impl Database {
    /// Stores a complete entry as-is, e.g. one imported from elsewhere.
    pub async fn insert_entry(&self, entry: &Entry) -> Result<()> {
        let record = entry.clone();
        self.execute(move |conn| insert_entry(conn, &record)).await
    }

    pub async fn get_entry(&self, entry_id: &str) -> Result<Option<Entry>> {
        let entry_id = entry_id.to_string();
        self.execute(move |conn| {
            let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?1");
            let entry = conn
                .query_row(&sql, params![entry_id], |row| Ok(row_to_entry(row)))
                .optional()?
                .transpose()?;
            Ok(entry)
        })
        .await
    }

    /// Entries still waiting for a stop or discard, newest first.
    pub async fn get_open_entries(&self) -> Result<Vec<Entry>> {
        self.execute(|conn| {
            let sql = format!(
                "SELECT {ENTRY_COLUMNS} FROM entries
                 WHERE status = 'Open'
                 ORDER BY started_at DESC"
            );
            query_entries(conn, &sql, [])
        })
        .await
    }

    /// Finished entries (finalized or abandoned), newest first.
    pub async fn list_entries(&self, limit: usize, offset: usize) -> Result<Vec<Entry>> {
        let limit = i64::try_from(limit).map_err(|_| anyhow!("limit {limit} out of range"))?;
        let offset = i64::try_from(offset).map_err(|_| anyhow!("offset {offset} out of range"))?;
        self.execute(move |conn| {
            let sql = format!(
                "SELECT {ENTRY_COLUMNS} FROM entries
                 WHERE status IN ('Finalized', 'Abandoned')
                 ORDER BY started_at DESC
                 LIMIT ?1 OFFSET ?2"
            );
            query_entries(conn, &sql, params![limit, offset])
        })
        .await
    }

    /// Closes an open entry left behind by a stale session without recording
    /// a duration.
    pub async fn mark_entry_abandoned(
        &self,
        entry_id: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let entry_id = entry_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE entries
                 SET status = ?1,
                     updated_at = ?2
                 WHERE id = ?3 AND status = 'Open'",
                params![
                    EntryStatus::Abandoned.as_str(),
                    updated_at.to_rfc3339(),
                    entry_id,
                ],
            )?;

            if rows_affected == 0 {
                return Err(anyhow!("open entry {entry_id} not found"));
            }
            Ok(())
        })
        .await
    }
}

impl EntryRepository for Database {
    fn create_open_entry(&self, category_ref: &str, started_at: DateTime<Utc>) -> Result<String> {
        let entry = Entry::open(Uuid::new_v4().to_string(), category_ref, started_at);
        let id = entry.id.clone();
        self.execute_blocking(move |conn| insert_entry(conn, &entry))?;
        Ok(id)
    }

    fn finalize_entry(
        &self,
        entry_ref: &str,
        ended_at: DateTime<Utc>,
        duration_seconds: u64,
    ) -> Result<()> {
        let entry_id = entry_ref.to_string();
        self.execute_blocking(move |conn| {
            finalize_entry(conn, &entry_id, ended_at, duration_seconds)
        })
    }

    fn delete_entry(&self, entry_ref: &str) -> Result<()> {
        let entry_id = entry_ref.to_string();
        self.execute_blocking(move |conn| delete_entry(conn, &entry_id))
    }
}
