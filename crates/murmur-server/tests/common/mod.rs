#![allow(dead_code)]

use async_trait::async_trait;
use murmur_server::config::Config;
use murmur_server::{AppState, Services};
use murmur_store::{
    FileDictionaryBackend, FileProfileBackend, GuildDictionaryStore, UserVoiceProfileStore,
};
use murmur_types::{ChannelId, GuildId, UserId, UserVoiceProfile};
use murmur_voice::{LoopbackAdapter, SpeechEngine, VoiceError};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Writes the text itself as the "waveform" and records every request.
#[derive(Default)]
pub struct RecordingEngine {
    renders: Mutex<Vec<(String, UserVoiceProfile)>>,
    fail: AtomicBool,
}

impl RecordingEngine {
    pub fn renders(&self) -> Vec<(String, UserVoiceProfile)> {
        self.renders.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.renders().into_iter().map(|(text, _)| text).collect()
    }

    pub fn last(&self) -> Option<(String, UserVoiceProfile)> {
        self.renders().pop()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SpeechEngine for RecordingEngine {
    async fn render(
        &self,
        text: &str,
        profile: &UserVoiceProfile,
        output: &Path,
    ) -> Result<(), VoiceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(VoiceError::Engine("synthesis failed".to_string()));
        }
        self.renders
            .lock()
            .unwrap()
            .push((text.to_string(), *profile));
        tokio::fs::write(output, text.as_bytes())
            .await
            .map_err(|e| VoiceError::Engine(e.to_string()))
    }
}

pub struct Harness {
    pub state: AppState,
    pub voice: Arc<LoopbackAdapter>,
    pub engine: Arc<RecordingEngine>,
    pub dir: TempDir,
}

pub const TEXT_CHANNEL: &str = "text";

/// Voice channel ids are global, so every guild gets its own.
pub fn voice_channel(guild: &str) -> ChannelId {
    ChannelId::from(format!("{guild}-vc"))
}

impl Harness {
    pub fn new() -> Self {
        Self::with(LoopbackAdapter::new("assistant"), |_| {})
    }

    pub fn with(adapter: LoopbackAdapter, tweak: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.storage.audio_dir = dir.path().join("vc");
        config.storage.dictionary_dir = dir.path().join("dic");
        config.storage.profile_path = dir.path().join("UserConfig.txt");
        tweak(&mut config);

        let voice = Arc::new(adapter.with_recording());
        let engine = Arc::new(RecordingEngine::default());
        let state = AppState::new(
            Services {
                adapter: voice.clone(),
                engine: engine.clone(),
                profiles: UserVoiceProfileStore::new(FileProfileBackend::new(
                    &config.storage.profile_path,
                )),
                dictionary: GuildDictionaryStore::new(FileDictionaryBackend::new(
                    &config.storage.dictionary_dir,
                )),
            },
            &config,
        );

        Self {
            state,
            voice,
            engine,
            dir,
        }
    }

    /// Puts `user` into the voice channel of `guild`.
    pub fn enter_voice(&self, guild: &str, user: &str) {
        self.voice.set_voice_state(
            &GuildId::from(guild),
            &UserId::from(user),
            Some(voice_channel(guild)),
        );
    }

    pub fn leave_voice(&self, guild: &str, user: &str) {
        self.voice
            .set_voice_state(&GuildId::from(guild), &UserId::from(user), None);
    }

    /// Joins `guild` on behalf of `user`, who is put into voice first.
    pub async fn join(&self, guild: &str, user: &str) -> Arc<murmur_server::GuildSession> {
        self.enter_voice(guild, user);
        self.state
            .join(
                &GuildId::from(guild),
                &ChannelId::from(TEXT_CHANNEL),
                &UserId::from(user),
            )
            .await
            .unwrap()
    }
}
