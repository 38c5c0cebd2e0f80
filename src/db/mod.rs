pub mod models;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Transaction, TransactionBehavior};
use std::path::Path;

use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial",
    include_str!("../../migrations/001_initial.sql"),
)];

pub fn create_pool(db_path: &Path, max_size: u32) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Per-connection pragmas; foreign_keys and busy_timeout do not persist.
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            ",
        )
    });
    let pool = Pool::builder().max_size(max_size.max(1)).build(manager)?;

    let conn = pool.get()?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        ",
    )?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    // Create migrations tracking table
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

/// Takes the write lock at BEGIN, so busy_timeout applies. A deferred
/// transaction that reads first fails with SQLITE_BUSY when it later writes
/// after another connection has committed.
pub fn write_transaction(conn: &rusqlite::Connection) -> rusqlite::Result<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
}

/// Largest sequence value handed out so far, used to seed the id generator.
pub fn max_sequence(conn: &rusqlite::Connection) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT MAX(
            COALESCE((SELECT MAX(seq) FROM threads), 0),
            COALESCE((SELECT MAX(seq) FROM posts), 0),
            COALESCE((SELECT MAX(seq) FROM notifications), 0),
            COALESCE((SELECT MAX(seq) FROM system_notifications), 0)
        )",
        [],
        |row| row.get(0),
    )
}

/// Drop expired sessions and login tokens. Returns the number of rows removed.
pub fn purge_expired(conn: &rusqlite::Connection) -> rusqlite::Result<usize> {
    let now = format_time(&Utc::now());
    let sessions = conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])?;
    let tokens = conn.execute(
        "DELETE FROM login_tokens WHERE expires_at <= ?1",
        params![now],
    )?;
    Ok(sessions + tokens)
}

/// Current time at the precision timestamps are stored with.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Timestamps are stored as RFC 3339 UTC strings with millisecond precision,
/// which keeps lexical and chronological order the same.
pub fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_time(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Migrated pool backed by a temp file. Keep the `TempDir` alive.
    pub fn pool() -> (tempfile::TempDir, DbPool) {
        pool_with_size(2)
    }

    pub fn pool_with_size(max_size: u32) -> (tempfile::TempDir, DbPool) {
        let tmp = tempfile::tempdir().unwrap();
        let pool = create_pool(&tmp.path().join("test.db"), max_size).unwrap();
        run_migrations(&pool).unwrap();
        (tmp, pool)
    }

    pub fn insert_user(conn: &rusqlite::Connection, id: &str, name: Option<&str>) {
        conn.execute(
            "INSERT INTO users (id, email, name) VALUES (?1, ?2, ?3)",
            params![id, format!("{}@example.org", id), name],
        )
        .unwrap();
    }
}
