//! Per-guild synthesis and playback.

use crate::error::SessionError;
use crate::session::{GuildSession, SynthesisGuard};
use murmur_store::{checked_file_key, GuildDictionaryStore, StoreError, UserVoiceProfileStore};
use murmur_types::UserId;
use murmur_voice::{SpeechEngine, TextSanitizer, VoiceAdapter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// What a synthesis request ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechOutcome {
    /// The sanitized text was rendered and played.
    Played(String),
    /// Nothing was spoken: the sanitized text was empty or the session had
    /// already left.
    Skipped,
}

/// Turns chat text into audio in a session's voice channel.
///
/// Every request runs under the session's synthesis lock, so utterances of
/// one guild never overlap while different guilds proceed independently.
/// Each guild renders into its own `<audio_dir>/<guild>.wav`, overwritten
/// per utterance.
pub struct SpeechSynthesisDispatcher {
    profiles: UserVoiceProfileStore,
    dictionary: GuildDictionaryStore,
    sanitizer: TextSanitizer,
    engine: Arc<dyn SpeechEngine>,
    adapter: Arc<dyn VoiceAdapter>,
    audio_dir: PathBuf,
    working_dirs: Vec<PathBuf>,
    dirs_ready: OnceCell<()>,
}

impl SpeechSynthesisDispatcher {
    pub fn new(
        profiles: UserVoiceProfileStore,
        dictionary: GuildDictionaryStore,
        sanitizer: TextSanitizer,
        engine: Arc<dyn SpeechEngine>,
        adapter: Arc<dyn VoiceAdapter>,
        audio_dir: impl Into<PathBuf>,
    ) -> Self {
        let audio_dir = audio_dir.into();
        Self {
            profiles,
            dictionary,
            sanitizer,
            engine,
            adapter,
            working_dirs: vec![audio_dir.clone()],
            audio_dir,
            dirs_ready: OnceCell::new(),
        }
    }

    /// Adds a directory that must exist before the first utterance.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dirs.push(dir.into());
        self
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    async fn ensure_dirs(&self) -> Result<(), StoreError> {
        self.dirs_ready
            .get_or_try_init(|| async {
                for dir in &self.working_dirs {
                    tokio::fs::create_dir_all(dir)
                        .await
                        .map_err(|source| StoreError::Io {
                            path: dir.clone(),
                            source,
                        })?;
                }
                Ok::<(), StoreError>(())
            })
            .await?;
        Ok(())
    }

    /// Speaks `raw` in the session's voice channel with `speaker`'s profile.
    ///
    /// Waits for any utterance or leave already running in the same guild.
    ///
    /// # Errors
    ///
    /// - `SessionError::Storage` if the profile or dictionary cannot be read
    /// - `SessionError::Engine` if rendering fails; nothing is played
    /// - `SessionError::VoiceAdapter` if playback fails
    pub async fn synthesize(
        &self,
        session: &GuildSession,
        speaker: &UserId,
        raw: &str,
    ) -> Result<SpeechOutcome, SessionError> {
        let guard = session.lock_synthesis().await;
        self.synthesize_locked(session, &guard, speaker, raw).await
    }

    /// Same as [`synthesize`](Self::synthesize) for a caller that already
    /// holds the session's lock.
    pub(crate) async fn synthesize_locked(
        &self,
        session: &GuildSession,
        _guard: &SynthesisGuard<'_>,
        speaker: &UserId,
        raw: &str,
    ) -> Result<SpeechOutcome, SessionError> {
        if session.is_closed() {
            debug!(guild_id = %session.guild_id(), "session already left, skipping utterance");
            return Ok(SpeechOutcome::Skipped);
        }

        self.ensure_dirs().await?;

        let profile = self.profiles.get_or_default(speaker).await?;
        let entries = self.dictionary.entries(session.guild_id()).await?;
        let text = self
            .sanitizer
            .sanitize(raw, &entries, session.speech_limit());
        if text.trim().is_empty() {
            debug!(guild_id = %session.guild_id(), "nothing speakable left after sanitizing");
            return Ok(SpeechOutcome::Skipped);
        }

        let file_name = format!("{}.wav", checked_file_key(session.guild_id().as_str())?);
        let output = self.audio_dir.join(file_name);

        self.engine
            .render(&text, &profile, &output)
            .await
            .map_err(SessionError::Engine)?;

        self.adapter
            .play_audio(session.connection(), &output)
            .await
            .map_err(SessionError::VoiceAdapter)?;

        info!(
            guild_id = %session.guild_id(),
            session_id = %session.id(),
            speaker = %speaker,
            chars = text.chars().count(),
            "spoke utterance"
        );
        Ok(SpeechOutcome::Played(text))
    }
}
