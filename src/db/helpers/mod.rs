use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use crate::db::models::EntryStatus;

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_status(value: &str) -> Result<EntryStatus> {
    match value {
        "Open" => Ok(EntryStatus::Open),
        "Finalized" => Ok(EntryStatus::Finalized),
        "Abandoned" => Ok(EntryStatus::Abandoned),
        other => Err(anyhow!("unknown entry status {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip() {
        for status in [EntryStatus::Open, EntryStatus::Finalized, EntryStatus::Abandoned] {
            assert_eq!(parse_status(status.as_str()).unwrap(), status);
        }
        assert!(parse_status("Running").is_err());
    }

    #[test]
    fn rejects_out_of_range_integers() {
        assert!(to_i64(u64::MAX).is_err());
        assert!(to_u64(-1, "duration_seconds").is_err());
        assert_eq!(to_u64(42, "duration_seconds").unwrap(), 42);
    }

    #[test]
    fn parses_rfc3339_to_utc() {
        let dt = parse_datetime("2024-05-01T10:00:00+02:00", "started_at").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-05-01T08:00:00+00:00");
        assert!(parse_optional_datetime(None, "ended_at").unwrap().is_none());
        assert!(parse_datetime("yesterday", "started_at").is_err());
    }
}
