//! Database migrations

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version
const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations
pub fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;

    Ok(version)
}

/// Migration to version 1: Initial schema
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "BEGIN;
         -- Schema version tracking
         CREATE TABLE IF NOT EXISTS schema_version (
             version INTEGER PRIMARY KEY
         );
         -- One JSON document per domain record, keyed by (kind, id)
         CREATE TABLE IF NOT EXISTS records (
             kind TEXT NOT NULL,
             id TEXT NOT NULL,
             data TEXT NOT NULL,
             PRIMARY KEY (kind, id)
         );
         -- Pending outgoing changes, drained oldest-first by push
         CREATE TABLE IF NOT EXISTS outbox (
             id TEXT PRIMARY KEY,
             record_type TEXT NOT NULL,
             record_id TEXT NOT NULL,
             change_type TEXT NOT NULL,
             change_time INTEGER NOT NULL
         );
         CREATE INDEX IF NOT EXISTS idx_outbox_change_time ON outbox(change_time);
         CREATE INDEX IF NOT EXISTS idx_outbox_record ON outbox(record_type, record_id);
         -- Settings table (local only)
         CREATE TABLE IF NOT EXISTS settings (
             key TEXT PRIMARY KEY,
             value TEXT NOT NULL
         );
         -- Record migration version
         INSERT INTO schema_version (version) VALUES (1);
         COMMIT;",
    )?;

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}
