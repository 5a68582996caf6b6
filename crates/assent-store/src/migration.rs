//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL
//! string that transforms the schema from version N to N+1.

use rusqlite::Connection;
use tracing::debug;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            debug!(version, "applying schema migration");
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Consent receipts (append-only)
        CREATE TABLE receipts (
            receipt_hash BLOB PRIMARY KEY,    -- 32 bytes, domain-separated Blake3
            version INTEGER NOT NULL,
            subject BLOB NOT NULL,            -- 32 bytes
            grantor BLOB NOT NULL,            -- 32 bytes, Ed25519 public key
            scope BLOB NOT NULL,              -- CBOR array of scope labels
            issued_at INTEGER NOT NULL,       -- Unix ms
            expires_at INTEGER,               -- Unix ms, nullable
            prev_receipt_hash BLOB,           -- 32 bytes, nullable (subject chain)
            signature BLOB NOT NULL,          -- 64 bytes, Ed25519
            canonical_bytes BLOB NOT NULL,    -- cached canonical encoding
            appended_at INTEGER NOT NULL      -- local timestamp of append
        );

        -- Revocation records (append-only, terminal per receipt)
        CREATE TABLE revocations (
            revocation_hash BLOB PRIMARY KEY, -- 32 bytes
            receipt_hash BLOB NOT NULL UNIQUE,
            version INTEGER NOT NULL,
            revoked_at INTEGER NOT NULL,      -- Unix ms
            signature BLOB NOT NULL,          -- 64 bytes, by the grantor key
            canonical_bytes BLOB NOT NULL,
            appended_at INTEGER NOT NULL
        );

        -- Per-subject chain state
        CREATE TABLE subjects (
            subject BLOB PRIMARY KEY,
            head_receipt_hash BLOB,
            receipt_count INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Global anchor chain
        CREATE TABLE anchors (
            height INTEGER PRIMARY KEY,       -- 1-indexed, contiguous
            kind INTEGER NOT NULL,            -- 0=consent, 1=revocation
            record_hash BLOB NOT NULL,        -- 32 bytes
            prev_anchor BLOB,                 -- 32 bytes, NULL at height 1
            anchor_hash BLOB NOT NULL UNIQUE  -- 32 bytes
        );

        -- Indexes for common queries
        CREATE INDEX idx_receipts_subject ON receipts(subject);
        CREATE INDEX idx_receipts_grantor ON receipts(grantor);
        CREATE INDEX idx_receipts_issued ON receipts(issued_at);
        "#,
    )?;

    Ok(())
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}
