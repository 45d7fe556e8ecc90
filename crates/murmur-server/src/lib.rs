//! murmur server library logic.
//!
//! Ties the stores and the voice pipeline into guild sessions: the session
//! registry, the synthesis dispatcher, the chat command surface, the
//! presence watcher, and the HTTP status surface.

pub mod api;
pub mod background;
pub mod commands;
pub mod config;
pub mod console;
pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod session;

pub use dispatcher::{SpeechOutcome, SpeechSynthesisDispatcher};
pub use error::SessionError;
pub use registry::SessionRegistry;
pub use session::GuildSession;

use config::{Config, StorageBackend};
use murmur_store::{GuildDictionaryStore, UserVoiceProfileStore};
use murmur_voice::{SpeechEngine, SpeechPhrases, TextSanitizer, VoiceAdapter};
use std::sync::Arc;

/// External collaborators the server is assembled from.
pub struct Services {
    pub adapter: Arc<dyn VoiceAdapter>,
    pub engine: Arc<dyn SpeechEngine>,
    pub profiles: UserVoiceProfileStore,
    pub dictionary: GuildDictionaryStore,
}

/// Application state shared by the chat gateway, the watcher, and the HTTP
/// handlers.
#[derive(Clone)]
pub struct AppState {
    /// Active sessions by guild.
    pub registry: SessionRegistry,
    /// Synthesis pipeline.
    pub dispatcher: Arc<SpeechSynthesisDispatcher>,
    /// Voice transport.
    pub adapter: Arc<dyn VoiceAdapter>,
    /// Per-user voice profiles.
    pub profiles: UserVoiceProfileStore,
    /// Per-guild word dictionaries.
    pub dictionary: GuildDictionaryStore,
    /// Greeting and farewell utterances.
    pub phrases: Arc<SpeechPhrases>,
    /// Command prefix.
    pub prefix: String,
    /// Messages starting with this marker are ignored. Empty disables it.
    pub silence_marker: String,
    /// Speech limit of a freshly joined session.
    pub default_speech_limit: usize,
}

impl AppState {
    pub fn new(services: Services, config: &Config) -> Self {
        let mut dispatcher = SpeechSynthesisDispatcher::new(
            services.profiles.clone(),
            services.dictionary.clone(),
            TextSanitizer::new(&config.speech),
            services.engine,
            Arc::clone(&services.adapter),
            &config.storage.audio_dir,
        );
        if config.storage.backend == StorageBackend::File {
            dispatcher = dispatcher.with_working_dir(&config.storage.dictionary_dir);
        }

        Self {
            registry: SessionRegistry::new(),
            dispatcher: Arc::new(dispatcher),
            adapter: services.adapter,
            profiles: services.profiles,
            dictionary: services.dictionary,
            phrases: Arc::new(config.speech.clone()),
            prefix: config.bot.prefix.clone(),
            silence_marker: config.bot.silence_marker.clone(),
            default_speech_limit: config.bot.default_speech_limit,
        }
    }

    /// Status line advertising the help command and the active session
    /// count.
    pub fn activity(&self) -> String {
        match self.registry.len() {
            0 => format!("{} help", self.prefix),
            n => format!("{} help | speaking in {} guild(s)", self.prefix, n),
        }
    }
}
