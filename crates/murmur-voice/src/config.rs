use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_binary() -> PathBuf {
    PathBuf::from("open_jtalk")
}

fn default_dictionary_dir() -> PathBuf {
    PathBuf::from("/var/lib/mecab/dic/open-jtalk/naist-jdic")
}

fn default_voice_model() -> PathBuf {
    PathBuf::from("/usr/share/hts-voice/nitech-jp-atr503-m001/nitech_jp_atr503_m001.htsvoice")
}

fn default_timeout_seconds() -> u64 {
    30
}

/// Settings for the external open_jtalk process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path or name of the `open_jtalk` executable.
    #[serde(default = "default_binary")]
    pub binary: PathBuf,
    /// MeCab dictionary directory passed as `-x`.
    #[serde(default = "default_dictionary_dir")]
    pub dictionary_dir: PathBuf,
    /// HTS voice model passed as `-m`.
    #[serde(default = "default_voice_model")]
    pub voice_model: PathBuf,
    /// Upper bound on a single synthesis run. Default: 30.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            dictionary_dir: default_dictionary_dir(),
            voice_model: default_voice_model(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

fn default_greeting() -> String {
    "おはー".to_string()
}

fn default_farewell() -> String {
    "さいなら".to_string()
}

fn default_filler() -> String {
    "すーきっぷ".to_string()
}

fn default_redaction() -> String {
    "ピーーーー".to_string()
}

/// Fixed utterances spoken by the assistant itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechPhrases {
    /// Spoken right after joining a voice channel.
    #[serde(default = "default_greeting")]
    pub greeting: String,
    /// Spoken right before leaving.
    #[serde(default = "default_farewell")]
    pub farewell: String,
    /// Replaces messages containing links, mentions, custom emoji, or code.
    #[serde(default = "default_filler")]
    pub filler: String,
    /// Replaces `||spoiler||` spans.
    #[serde(default = "default_redaction")]
    pub redaction: String,
}

impl Default for SpeechPhrases {
    fn default() -> Self {
        Self {
            greeting: default_greeting(),
            farewell: default_farewell(),
            filler: default_filler(),
            redaction: default_redaction(),
        }
    }
}
