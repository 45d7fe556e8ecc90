//! Persisted per-user voice profiles and per-guild word dictionaries.
//!
//! Both stores are split in two layers:
//!
//! - a small key-based backend trait ([`ProfileBackend`],
//!   [`DictionaryBackend`]) that only knows how to load and write records, and
//! - a store type ([`UserVoiceProfileStore`], [`GuildDictionaryStore`]) that
//!   owns the validation, merge, and replacement rules on top of any backend.
//!
//! Two backends ship with the crate. The flat-file backends keep the
//! historical on-disk layout (read everything, rewrite everything; last
//! writer wins across processes). A rewrite lands through a sibling temp
//! file and a rename, so readers see either the old or the new file. The
//! SQLite backends keep the same call contracts with transactional writes.

use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

mod dictionary;
mod profile;
mod sqlite;

pub use dictionary::{DictionaryBackend, FileDictionaryBackend, GuildDictionaryStore};
pub use profile::{FileProfileBackend, ProfileBackend, UserVoiceProfileStore};
pub use sqlite::{SqliteDictionaryBackend, SqliteProfileBackend};

/// Errors raised by the profile and dictionary stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing a backing file failed.
    #[error("storage i/o error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A SQLite statement failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No pooled connection could be obtained.
    #[error("database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// The submitted record was rejected before reaching storage.
    #[error(transparent)]
    Validation(#[from] murmur_types::ValidationError),

    /// A key cannot be mapped onto the storage layout.
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),

    /// A blocking storage task was cancelled or panicked.
    #[error("storage task failed: {0}")]
    Task(String),
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Atomically replaces `path` with `contents`.
///
/// The new contents are written to a temp file in the same directory and
/// renamed over `path`. Missing parent directories are created.
pub(crate) async fn replace_file(path: &Path, contents: String) -> Result<(), StoreError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let mut tmp =
            tempfile::NamedTempFile::new_in(&dir).map_err(|e| StoreError::io(&dir, e))?;
        tmp.write_all(contents.as_bytes())
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| StoreError::io(tmp.path(), e))?;
        tmp.persist(&path).map_err(|e| StoreError::io(&path, e.error))?;
        Ok::<(), StoreError>(())
    })
    .await
    .map_err(|e| StoreError::Task(e.to_string()))?
}

/// Rejects keys that would escape the storage directory when used as a
/// file name.
pub fn checked_file_key(key: &str) -> Result<&str, StoreError> {
    let bad = key.is_empty()
        || key == "."
        || key == ".."
        || key
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '\0') || c.is_control());
    if bad {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(key)
}
