//! The `schema_migrations` table: one row per applied migration.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};

use crate::db::schema::CURRENT_TIMESTAMP;
use crate::db::table_exists;
use crate::error::Result;
use crate::models::MigrationRecord;

use super::Migration;

pub const TABLE: &str = "schema_migrations";

pub fn exists(conn: &Connection) -> Result<bool> {
    table_exists(conn, TABLE)
}

pub fn ensure(conn: &Connection) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {TABLE} (
            version TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT ({CURRENT_TIMESTAMP})
        );"
    ))?;
    Ok(())
}

/// Applied migrations, oldest first. Empty when the ledger was never created.
pub fn applied(conn: &Connection) -> Result<Vec<MigrationRecord>> {
    if !exists(conn)? {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(&format!(
        "SELECT version, name, applied_at FROM {TABLE} ORDER BY version"
    ))?;
    let records = stmt
        .query_map([], record_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(records)
}

pub fn record(conn: &Connection, migration: &Migration) -> Result<MigrationRecord> {
    conn.execute(
        &format!("INSERT INTO {TABLE} (version, name) VALUES (?1, ?2)"),
        params![migration.version(), migration.name()],
    )?;
    let record = conn.query_row(
        &format!("SELECT version, name, applied_at FROM {TABLE} WHERE version = ?1"),
        params![migration.version()],
        record_from_row,
    )?;
    Ok(record)
}

pub fn remove(conn: &Connection, version: &str) -> Result<()> {
    conn.execute(
        &format!("DELETE FROM {TABLE} WHERE version = ?1"),
        params![version],
    )?;
    Ok(())
}

fn record_from_row(row: &Row) -> rusqlite::Result<MigrationRecord> {
    let applied_at: String = row.get(2)?;
    Ok(MigrationRecord {
        version: row.get(0)?,
        name: row.get(1)?,
        applied_at: parse_datetime(&applied_at).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                Type::Text,
                format!("invalid applied_at `{applied_at}`").into(),
            )
        })?,
    })
}

pub(crate) fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // RFC3339 (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite strftime, with or without milliseconds
    // (e.g., "2026-01-11 12:34:56.789" or "2026-01-11 12:34:56")
    ["%Y-%m-%d %H:%M:%S%.3f", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| chrono::NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}
