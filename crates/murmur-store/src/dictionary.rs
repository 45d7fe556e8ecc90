//! Per-guild word substitution dictionaries.

use crate::{checked_file_key, replace_file, StoreError};
use async_trait::async_trait;
use murmur_types::{DictionaryEntry, GuildId};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Key-based persistence for guild dictionaries.
#[async_trait]
pub trait DictionaryBackend: Send + Sync + 'static {
    /// Returns the entries of `guild` in stored order, creating empty
    /// storage for a guild seen for the first time.
    async fn entries(&self, guild: &GuildId) -> Result<Vec<DictionaryEntry>, StoreError>;

    /// Stores `entry`, replacing the existing record with the same `from`
    /// token in place, or appending it.
    async fn upsert(&self, guild: &GuildId, entry: &DictionaryEntry) -> Result<(), StoreError>;
}

/// Adds and lists word substitutions per guild.
#[derive(Clone)]
pub struct GuildDictionaryStore {
    backend: Arc<dyn DictionaryBackend>,
}

impl GuildDictionaryStore {
    pub fn new(backend: impl DictionaryBackend) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Parses a raw `from,to` pair and records it for `guild`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` with `InvalidFormat` if `raw_pair`
    /// does not split into exactly two non-empty tokens, or a backend error.
    pub async fn add_entry(
        &self,
        guild: &GuildId,
        raw_pair: &str,
    ) -> Result<DictionaryEntry, StoreError> {
        let entry = DictionaryEntry::parse_pair(raw_pair)?;
        self.backend.upsert(guild, &entry).await?;
        tracing::info!(guild_id = %guild, from = %entry.from, to = %entry.to, "added dictionary entry");
        Ok(entry)
    }

    /// Snapshot of the dictionary of `guild` at call time.
    pub async fn entries(&self, guild: &GuildId) -> Result<Vec<DictionaryEntry>, StoreError> {
        self.backend.entries(guild).await
    }
}

/// Flat-file backend: `<dir>/<guild>.txt`, one `from,to` pair per line.
///
/// Upserts rewrite the file and rename it into place, so `entries` never
/// observes a partially written dictionary.
#[derive(Debug)]
pub struct FileDictionaryBackend {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileDictionaryBackend {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, guild: &GuildId) -> Result<PathBuf, StoreError> {
        let key = checked_file_key(guild.as_str())?;
        Ok(self.dir.join(format!("{key}.txt")))
    }

    /// Reads the dictionary file of `guild`, creating the directory and an
    /// empty file if either is missing.
    async fn read_or_create(&self, path: &Path) -> Result<String, StoreError> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tokio::fs::create_dir_all(&self.dir)
                    .await
                    .map_err(|e| StoreError::io(&self.dir, e))?;
                tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .await
                    .map_err(|e| StoreError::io(path, e))?;
                tracing::debug!(path = ?path, "created empty dictionary");
                Ok(String::new())
            }
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}

#[async_trait]
impl DictionaryBackend for FileDictionaryBackend {
    async fn entries(&self, guild: &GuildId) -> Result<Vec<DictionaryEntry>, StoreError> {
        let path = self.path_for(guild)?;
        let contents = self.read_or_create(&path).await?;
        Ok(contents
            .lines()
            .filter(|line| !line.is_empty())
            .filter_map(|line| {
                let entry = parse_line(line);
                if entry.is_none() {
                    tracing::warn!(path = ?path, line, "skipping malformed dictionary line");
                }
                entry
            })
            .collect())
    }

    async fn upsert(&self, guild: &GuildId, entry: &DictionaryEntry) -> Result<(), StoreError> {
        let path = self.path_for(guild)?;
        let _guard = self.write_lock.lock().await;

        let contents = self.read_or_create(&path).await?;
        let new_line = format!("{},{}", entry.from, entry.to);
        let mut replaced = false;
        let mut out = String::with_capacity(contents.len() + new_line.len() + 1);
        for line in contents.lines().filter(|line| !line.is_empty()) {
            let same_key = parse_line(line).is_some_and(|existing| existing.from == entry.from);
            if same_key {
                if replaced {
                    continue;
                }
                replaced = true;
                out.push_str(&new_line);
            } else {
                out.push_str(line);
            }
            out.push('\n');
        }
        if !replaced {
            out.push_str(&new_line);
            out.push('\n');
        }

        replace_file(&path, out).await
    }
}

fn parse_line(line: &str) -> Option<DictionaryEntry> {
    let (from, to) = line.split_once(',')?;
    if from.is_empty() || to.is_empty() {
        return None;
    }
    Some(DictionaryEntry::new(from, to))
}
