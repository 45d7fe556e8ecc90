//! Per-user voice profile storage.

use crate::{replace_file, StoreError};
use async_trait::async_trait;
use murmur_types::{UserId, UserVoiceProfile};
use std::path::{Path, PathBuf};
use std::str::SplitWhitespace;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Key-based persistence for voice profiles.
#[async_trait]
pub trait ProfileBackend: Send + Sync + 'static {
    /// Returns the stored profile for `user`, or `None` if nothing was ever
    /// recorded.
    async fn load(&self, user: &UserId) -> Result<Option<UserVoiceProfile>, StoreError>;

    /// Merges `candidate` onto the stored record of `user` (or the default
    /// baseline) and writes the result, as one step with respect to other
    /// merges on the same backend. Returns the stored profile.
    async fn merge(
        &self,
        user: &UserId,
        candidate: &UserVoiceProfile,
    ) -> Result<UserVoiceProfile, StoreError>;
}

/// Resolves and updates per-user synthesis parameters.
#[derive(Clone)]
pub struct UserVoiceProfileStore {
    backend: Arc<dyn ProfileBackend>,
}

impl UserVoiceProfileStore {
    pub fn new(backend: impl ProfileBackend) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Returns the profile `user` speaks with.
    ///
    /// The reserved system speaker always gets [`UserVoiceProfile::SYSTEM`]
    /// without touching storage. Users without a record get
    /// [`UserVoiceProfile::DEFAULT`], which is not persisted.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend fails for any reason other than a
    /// missing record.
    pub async fn get_or_default(&self, user: &UserId) -> Result<UserVoiceProfile, StoreError> {
        if user.is_system() {
            return Ok(UserVoiceProfile::SYSTEM);
        }
        Ok(self.backend.load(user).await?.unwrap_or_default())
    }

    /// Validates `candidate` and merges it into the stored profile of `user`.
    ///
    /// Only fields of `candidate` that differ from the default baseline are
    /// applied; the rest keep their stored values. A candidate equal to the
    /// default changes nothing and is not written. Returns the resulting
    /// profile.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` naming the first out-of-range field
    /// (the stored profile is left untouched), or a backend error.
    pub async fn set_profile(
        &self,
        user: &UserId,
        candidate: UserVoiceProfile,
    ) -> Result<UserVoiceProfile, StoreError> {
        candidate.validate()?;
        if user.is_system() {
            return Err(StoreError::InvalidKey(user.to_string()));
        }

        if !candidate.differs_from_default() {
            tracing::debug!(user_id = %user, "profile candidate equals default, nothing to write");
            return Ok(self.backend.load(user).await?.unwrap_or_default());
        }

        let merged = self.backend.merge(user, &candidate).await?;
        tracing::info!(
            user_id = %user,
            alpha = merged.alpha,
            speed = merged.speed,
            pitch = merged.pitch,
            accent = merged.accent,
            "updated voice profile"
        );
        Ok(merged)
    }
}

/// Flat-file backend: one shared file, one line per user.
///
/// Line format: `UserID:<id> Alpha:<f> Speed:<f> Pitch:<f> Accent:<f>`.
/// Every merge rewrites the whole file under the backend's write lock and
/// swaps it in with a rename. Lines that do not parse are carried over
/// verbatim.
#[derive(Debug)]
pub struct FileProfileBackend {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileProfileBackend {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_contents(&self) -> Result<String, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }
}

#[async_trait]
impl ProfileBackend for FileProfileBackend {
    async fn load(&self, user: &UserId) -> Result<Option<UserVoiceProfile>, StoreError> {
        let contents = self.read_contents().await?;
        Ok(contents
            .lines()
            .filter_map(parse_line)
            .find(|(id, _)| *id == user.as_str())
            .map(|(_, profile)| profile))
    }

    async fn merge(
        &self,
        user: &UserId,
        candidate: &UserVoiceProfile,
    ) -> Result<UserVoiceProfile, StoreError> {
        let _guard = self.write_lock.lock().await;

        let contents = self.read_contents().await?;
        let current = contents
            .lines()
            .filter_map(parse_line)
            .find(|(id, _)| *id == user.as_str())
            .map(|(_, profile)| profile)
            .unwrap_or_default();
        let merged = current.merged_with(candidate);

        let mut out = String::with_capacity(contents.len() + 64);
        for line in contents.lines() {
            if line.is_empty() {
                continue;
            }
            match parse_line(line) {
                Some((id, _)) if id == user.as_str() => {}
                parsed => {
                    if parsed.is_none() {
                        tracing::warn!(path = ?self.path, line, "keeping unparseable profile line");
                    }
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
        out.push_str(&format_line(user, &merged));
        out.push('\n');

        replace_file(&self.path, out).await?;
        Ok(merged)
    }
}

fn format_line(user: &UserId, p: &UserVoiceProfile) -> String {
    format!(
        "UserID:{} Alpha:{} Speed:{} Pitch:{} Accent:{}",
        user, p.alpha, p.speed, p.pitch, p.accent
    )
}

fn parse_line(line: &str) -> Option<(&str, UserVoiceProfile)> {
    let mut fields = line.split_whitespace();

    let id = next_field(&mut fields, "UserID:")?;
    let alpha = next_field(&mut fields, "Alpha:")?.parse().ok()?;
    let speed = next_field(&mut fields, "Speed:")?.parse().ok()?;
    let pitch = next_field(&mut fields, "Pitch:")?.parse().ok()?;
    let accent = next_field(&mut fields, "Accent:")?.parse().ok()?;
    if id.is_empty() {
        return None;
    }
    Some((id, UserVoiceProfile::new(alpha, speed, pitch, accent)))
}

fn next_field<'a>(fields: &mut SplitWhitespace<'a>, key: &str) -> Option<&'a str> {
    fields.next()?.strip_prefix(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_format_matches_layout() {
        let line = format_line(
            &UserId::from("42"),
            &UserVoiceProfile::new(0.54, 1.0, -2.5, 3.0),
        );
        assert_eq!(line, "UserID:42 Alpha:0.54 Speed:1 Pitch:-2.5 Accent:3");

        let (id, profile) = parse_line(&line).unwrap();
        assert_eq!(id, "42");
        assert_eq!(profile, UserVoiceProfile::new(0.54, 1.0, -2.5, 3.0));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse_line("").is_none());
        assert!(parse_line("UserID:1 Alpha:x Speed:1 Pitch:0 Accent:3").is_none());
        assert!(parse_line("UserID:1 Alpha:0.5").is_none());
        assert!(parse_line("Alpha:0.5 UserID:1 Speed:1 Pitch:0 Accent:3").is_none());
    }

    #[tokio::test]
    async fn missing_file_means_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = UserVoiceProfileStore::new(FileProfileBackend::new(
            dir.path().join("UserConfig.txt"),
        ));

        let profile = store.get_or_default(&UserId::from("7")).await.unwrap();
        assert_eq!(profile, UserVoiceProfile::DEFAULT);
        assert!(!dir.path().join("UserConfig.txt").exists());
    }

    #[tokio::test]
    async fn user_id_prefix_does_not_match_longer_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("UserConfig.txt");
        std::fs::write(&path, "UserID:123 Alpha:0.9 Speed:2 Pitch:1 Accent:4\n").unwrap();

        let backend = FileProfileBackend::new(&path);
        assert!(backend.load(&UserId::from("12")).await.unwrap().is_none());
        assert_eq!(
            backend.load(&UserId::from("123")).await.unwrap(),
            Some(UserVoiceProfile::new(0.9, 2.0, 1.0, 4.0))
        );
    }

    #[tokio::test]
    async fn merge_replaces_only_own_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("UserConfig.txt");
        std::fs::write(
            &path,
            "UserID:1 Alpha:0.1 Speed:1 Pitch:0 Accent:3\nnot a profile\nUserID:2 Alpha:0.2 Speed:1 Pitch:0 Accent:3\n",
        )
        .unwrap();

        let backend = FileProfileBackend::new(&path);
        let merged = backend
            .merge(&UserId::from("1"), &UserVoiceProfile::new(0.7, 1.0, 0.0, 3.0))
            .await
            .unwrap();
        assert_eq!(merged, UserVoiceProfile::new(0.7, 1.0, 0.0, 3.0));

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            contents,
            "not a profile\nUserID:2 Alpha:0.2 Speed:1 Pitch:0 Accent:3\nUserID:1 Alpha:0.7 Speed:1 Pitch:0 Accent:3\n"
        );
    }
}
