//! SQLite backends for the profile and dictionary stores.
//!
//! Every call runs on the blocking pool with its own pooled connection.
//! Writes are single statements or short transactions, so concurrent
//! updates to different users or guilds never clobber each other.

use crate::dictionary::DictionaryBackend;
use crate::profile::ProfileBackend;
use crate::StoreError;
use async_trait::async_trait;
use murmur_db::DbPool;
use murmur_types::{DictionaryEntry, GuildId, UserId, UserVoiceProfile};
use rusqlite::{params, OptionalExtension, TransactionBehavior};

async fn with_conn<T, F>(pool: &DbPool, f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> Result<T, StoreError> + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool.get()?;
        f(&conn)
    })
    .await
    .map_err(|e| StoreError::Task(e.to_string()))?
}

/// Profiles in the `user_voice_profiles` table.
#[derive(Debug, Clone)]
pub struct SqliteProfileBackend {
    pool: DbPool,
}

impl SqliteProfileBackend {
    /// Wraps a pool whose database has already been migrated.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileBackend for SqliteProfileBackend {
    async fn load(&self, user: &UserId) -> Result<Option<UserVoiceProfile>, StoreError> {
        let user = user.as_str().to_string();
        with_conn(&self.pool, move |conn| {
            let profile = conn
                .query_row(
                    "SELECT alpha, speed, pitch, accent FROM user_voice_profiles WHERE user_id = ?1",
                    [&user],
                    |row| {
                        Ok(UserVoiceProfile::new(
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                        ))
                    },
                )
                .optional()?;
            Ok(profile)
        })
        .await
    }

    async fn merge(
        &self,
        user: &UserId,
        candidate: &UserVoiceProfile,
    ) -> Result<UserVoiceProfile, StoreError> {
        let user = user.as_str().to_string();
        let candidate = *candidate;
        with_conn(&self.pool, move |conn| {
            // IMMEDIATE takes the write lock before the read, so two merges
            // for the same user cannot both start from the same stored row.
            let tx = rusqlite::Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
            let current = tx
                .query_row(
                    "SELECT alpha, speed, pitch, accent FROM user_voice_profiles WHERE user_id = ?1",
                    [&user],
                    |row| {
                        Ok(UserVoiceProfile::new(
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                        ))
                    },
                )
                .optional()?
                .unwrap_or_default();
            let p = current.merged_with(&candidate);

            tx.execute(
                "INSERT INTO user_voice_profiles (user_id, alpha, speed, pitch, accent)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(user_id) DO UPDATE SET
                    alpha = excluded.alpha,
                    speed = excluded.speed,
                    pitch = excluded.pitch,
                    accent = excluded.accent,
                    updated_at = datetime('now')",
                params![user, p.alpha, p.speed, p.pitch, p.accent],
            )?;
            tx.commit()?;
            Ok(p)
        })
        .await
    }
}

/// Dictionary entries in the `dictionary_entries` table, ordered by
/// insertion id.
#[derive(Debug, Clone)]
pub struct SqliteDictionaryBackend {
    pool: DbPool,
}

impl SqliteDictionaryBackend {
    /// Wraps a pool whose database has already been migrated.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DictionaryBackend for SqliteDictionaryBackend {
    async fn entries(&self, guild: &GuildId) -> Result<Vec<DictionaryEntry>, StoreError> {
        let guild = guild.as_str().to_string();
        with_conn(&self.pool, move |conn| {
            let mut stmt = conn.prepare(
                "SELECT from_token, to_token FROM dictionary_entries
                 WHERE guild_id = ?1 ORDER BY id",
            )?;
            let entries = stmt
                .query_map([&guild], |row| {
                    Ok(DictionaryEntry::new(
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
        .await
    }

    async fn upsert(&self, guild: &GuildId, entry: &DictionaryEntry) -> Result<(), StoreError> {
        let guild = guild.as_str().to_string();
        let entry = entry.clone();
        with_conn(&self.pool, move |conn| {
            // ON CONFLICT DO UPDATE keeps the row id, so the entry keeps its
            // position in application order.
            conn.execute(
                "INSERT INTO dictionary_entries (guild_id, from_token, to_token)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(guild_id, from_token) DO UPDATE SET to_token = excluded.to_token",
                params![guild, entry.from, entry.to],
            )?;
            Ok(())
        })
        .await
    }
}
