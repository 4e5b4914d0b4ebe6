use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::db::connection::Database;
use crate::store::SnapshotStore;

impl SnapshotStore for Database {
    fn save(&self, key: &str, payload: &str) -> Result<()> {
        let key = key.to_string();
        let payload = payload.to_string();
        self.execute_blocking(move |conn| {
            conn.execute(
                "INSERT INTO snapshots (key, payload, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                     payload = excluded.payload,
                     updated_at = excluded.updated_at",
                params![key, payload, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
    }

    fn load(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.execute_blocking(move |conn| {
            let payload = conn
                .query_row(
                    "SELECT payload FROM snapshots WHERE key = ?1",
                    params![key],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            Ok(payload)
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.execute_blocking(move |conn| {
            conn.execute("DELETE FROM snapshots WHERE key = ?1", params![key])?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn upserts_and_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshots.sqlite3");
        {
            let db = Database::new(path.clone()).unwrap();
            db.save("pomodoro", "{\"cycle\":1}").unwrap();
            db.save("pomodoro", "{\"cycle\":2}").unwrap();
        }

        let db = Database::new(path).unwrap();
        assert_eq!(db.load("pomodoro").unwrap().as_deref(), Some("{\"cycle\":2}"));

        db.remove("pomodoro").unwrap();
        assert!(db.load("pomodoro").unwrap().is_none());
    }
}
