//! Schema upgrades for the store database.
//!
//! The schema version lives in `PRAGMA user_version`: version `n` means the
//! first `n` entries of [`SCHEMA`] have been applied. Each upgrade runs in
//! its own transaction together with the version bump.

use rusqlite::{Connection, TransactionBehavior};
use thiserror::Error;

const SCHEMA: &[(&str, &str)] = &[
    (
        "voice_profiles",
        include_str!("migrations/001_voice_profiles.sql"),
    ),
    (
        "dictionary_entries",
        include_str!("migrations/002_dictionary_entries.sql"),
    ),
];

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("schema upgrade to version {version} ({name}) failed: {source}")]
    Upgrade {
        version: usize,
        name: &'static str,
        source: rusqlite::Error,
    },

    #[error("cannot read schema version: {0}")]
    Version(rusqlite::Error),

    /// The database was written by a newer build.
    #[error("database schema version {found} is newer than this build ({known})")]
    TooNew { found: usize, known: usize },
}

/// Applies every schema upgrade the database has not seen yet and returns
/// how many ran.
///
/// # Errors
///
/// `MigrationError` if the version cannot be read, the database is ahead
/// of this build, or an upgrade fails. A failed upgrade leaves the database
/// at the previous version.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    apply(conn, SCHEMA)
}

fn apply(conn: &Connection, schema: &[(&'static str, &str)]) -> Result<usize, MigrationError> {
    let current = schema_version(conn)?;
    if current > schema.len() {
        return Err(MigrationError::TooNew {
            found: current,
            known: schema.len(),
        });
    }

    for (index, &(name, sql)) in schema.iter().enumerate().skip(current) {
        let version = index + 1;
        let upgrade = |source| MigrationError::Upgrade {
            version,
            name,
            source,
        };

        let tx = rusqlite::Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
            .map_err(upgrade)?;
        tx.execute_batch(sql).map_err(upgrade)?;
        tx.pragma_update(None, "user_version", version as i64)
            .map_err(upgrade)?;
        tx.commit().map_err(upgrade)?;

        tracing::info!(version, name, "upgraded store schema");
    }

    Ok(schema.len() - current)
}

fn schema_version(conn: &Connection) -> Result<usize, MigrationError> {
    let version: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(MigrationError::Version)?;
    Ok(usize::try_from(version).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrated() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(run_migrations(&conn).unwrap(), SCHEMA.len());
        conn
    }

    #[test]
    fn upgrades_run_once() {
        let conn = migrated();
        assert_eq!(schema_version(&conn).unwrap(), SCHEMA.len());
        assert_eq!(run_migrations(&conn).unwrap(), 0);
    }

    #[test]
    fn profile_bounds_are_checked() {
        let conn = migrated();
        let insert = |alpha: f64, accent: f64| {
            conn.execute(
                "INSERT OR REPLACE INTO user_voice_profiles (user_id, alpha, speed, pitch, accent)
                 VALUES ('1', ?1, 1.0, 0.0, ?2)",
                rusqlite::params![alpha, accent],
            )
        };

        assert!(insert(0.54, 3.0).is_ok());
        assert!(insert(1.5, 3.0).is_err());
        assert!(insert(0.54, 50.5).is_err());
    }

    #[test]
    fn dictionary_upsert_keeps_row_position() {
        let conn = migrated();
        let upsert = |from: &str, to: &str| {
            conn.execute(
                "INSERT INTO dictionary_entries (guild_id, from_token, to_token) VALUES ('g', ?1, ?2)
                 ON CONFLICT(guild_id, from_token) DO UPDATE SET to_token = excluded.to_token",
                [from, to],
            )
            .unwrap();
        };
        upsert("w", "わら");
        upsert("gg", "ぐっげー");
        upsert("w", "わろた");

        let mut stmt = conn
            .prepare("SELECT from_token, to_token FROM dictionary_entries ORDER BY id")
            .unwrap();
        let rows: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(
            rows,
            [
                ("w".to_string(), "わろた".to_string()),
                ("gg".to_string(), "ぐっげー".to_string()),
            ]
        );

        // Same token in another guild is a separate entry.
        conn.execute(
            "INSERT INTO dictionary_entries (guild_id, from_token, to_token) VALUES ('h', 'w', 'x')",
            [],
        )
        .unwrap();
    }

    #[test]
    fn failed_upgrade_keeps_previous_version() {
        let conn = Connection::open_in_memory().unwrap();
        let schema = [
            ("first", "CREATE TABLE kept (id INTEGER PRIMARY KEY);"),
            (
                "second",
                "CREATE TABLE half_done (id INTEGER PRIMARY KEY); SELECT * FROM missing_table;",
            ),
        ];

        let err = apply(&conn, &schema).unwrap_err();
        assert!(
            matches!(err, MigrationError::Upgrade { version: 2, name: "second", .. }),
            "got {err:?}"
        );
        assert_eq!(schema_version(&conn).unwrap(), 1);

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(tables, ["kept"]);
    }

    #[test]
    fn newer_database_is_refused() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", 99_i64).unwrap();
        assert!(matches!(
            run_migrations(&conn),
            Err(MigrationError::TooNew { found: 99, .. })
        ));
    }
}
