//! Pooled connections to the store database.

use crate::migrations::{run_migrations, MigrationError};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Where the store database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    File(PathBuf),
    /// A private in-memory database. The pool is capped at one connection,
    /// since every SQLite connection to `:memory:` sees its own database.
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// How long a writer waits on a locked database before failing.
    pub busy_timeout_ms: u64,
    pub max_connections: u32,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            max_connections: 4,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("cannot open store database: {0}")]
    Pool(#[from] r2d2::Error),

    #[error(transparent)]
    Migration(#[from] MigrationError),
}

/// Opens the store database at `location` and brings its schema up to date.
///
/// # Errors
///
/// `DbError::Pool` if no connection can be established, or
/// `DbError::Migration` if the schema cannot be upgraded.
pub fn open_store(location: &DbLocation, settings: PoolSettings) -> Result<DbPool, DbError> {
    let (manager, max_connections, file_backed) = match location {
        DbLocation::File(path) => (
            SqliteConnectionManager::file(path),
            settings.max_connections.max(1),
            true,
        ),
        DbLocation::Memory => (SqliteConnectionManager::memory(), 1, false),
    };
    let busy_timeout = Duration::from_millis(settings.busy_timeout_ms);
    let manager = manager.with_init(move |conn| configure(conn, busy_timeout, file_backed));

    let pool = Pool::builder().max_size(max_connections).build(manager)?;

    let applied = run_migrations(&*pool.get()?)?;
    tracing::info!(
        location = ?location,
        max_connections,
        applied,
        "store database ready"
    );
    Ok(pool)
}

fn configure(conn: &mut Connection, busy_timeout: Duration, file_backed: bool) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    if !file_backed {
        return Ok(());
    }

    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        // Still correct under a rollback journal, just slower for readers.
        tracing::warn!(journal_mode = %mode, "store database did not switch to WAL");
    }
    // NORMAL is durable across application crashes in WAL mode.
    conn.pragma_update(None, "synchronous", "NORMAL")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_is_shared_by_every_checkout() {
        let pool = open_store(
            &DbLocation::Memory,
            PoolSettings {
                busy_timeout_ms: 250,
                max_connections: 8,
            },
        )
        .unwrap();
        assert_eq!(pool.max_size(), 1);

        pool.get()
            .unwrap()
            .execute(
                "INSERT INTO dictionary_entries (guild_id, from_token, to_token) VALUES ('g', 'w', 'わら')",
                [],
            )
            .unwrap();

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM dictionary_entries", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);

        let busy: i64 = conn
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .unwrap();
        assert_eq!(busy, 250);
    }

    #[test]
    fn file_store_uses_wal() {
        let dir = tempfile::tempdir().unwrap();
        let pool = open_store(
            &DbLocation::File(dir.path().join("murmur.db")),
            PoolSettings::default(),
        )
        .unwrap();
        let conn = pool.get().unwrap();

        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");

        // 1 = NORMAL
        let sync: i64 = conn
            .query_row("PRAGMA synchronous", [], |row| row.get(0))
            .unwrap();
        assert_eq!(sync, 1);
    }
}
