//! Configuration loading from file and environment variables.

use murmur_types::{validate_speech_limit, DEFAULT_SPEECH_LIMIT};
use murmur_voice::{EngineConfig, SpeechPhrases};
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use thiserror::Error;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Status HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Chat-facing behavior.
    #[serde(default)]
    pub bot: BotConfig,

    /// open_jtalk process settings.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Fixed utterances.
    #[serde(default)]
    pub speech: SpeechPhrases,

    /// Persistence settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Auto-leave watcher settings.
    #[serde(default)]
    pub presence: PresenceConfig,
}

/// Network configuration for the status HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Whether to serve the status endpoints at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "murmur_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Chat-facing behavior.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Command prefix, e.g. `!murmur` for `!murmur join`.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Messages starting with this marker are never read aloud.
    #[serde(default = "default_silence_marker")]
    pub silence_marker: String,

    /// Speech character limit of a freshly joined session.
    #[serde(default = "default_speech_limit")]
    pub default_speech_limit: usize,

    /// Account id the console voice transport uses for the assistant.
    #[serde(default = "default_assistant_id")]
    pub assistant_id: String,
}

/// Which store implementation backs profiles and dictionaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// One text file per guild dictionary plus a shared profile file.
    #[default]
    File,
    /// A single SQLite database.
    Sqlite,
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Directory holding `<guild>.txt` dictionaries (file backend).
    #[serde(default = "default_dictionary_dir")]
    pub dictionary_dir: PathBuf,

    /// Shared profile file (file backend).
    #[serde(default = "default_profile_path")]
    pub profile_path: PathBuf,

    /// Directory holding the transient `<guild>.wav` artifacts.
    #[serde(default = "default_audio_dir")]
    pub audio_dir: PathBuf,

    /// SQLite database path (sqlite backend).
    #[serde(default = "default_db_path")]
    pub database_path: String,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum pooled SQLite connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Auto-leave watcher configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PresenceConfig {
    /// Milliseconds between occupancy checks.
    #[serde(default = "default_presence_interval_ms")]
    pub interval_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_prefix() -> String {
    "!murmur".to_string()
}

fn default_silence_marker() -> String {
    ";".to_string()
}

fn default_speech_limit() -> usize {
    DEFAULT_SPEECH_LIMIT
}

fn default_assistant_id() -> String {
    "murmur".to_string()
}

fn default_dictionary_dir() -> PathBuf {
    PathBuf::from("./dic")
}

fn default_profile_path() -> PathBuf {
    PathBuf::from("./UserConfig.txt")
}

fn default_audio_dir() -> PathBuf {
    PathBuf::from("./vc")
}

fn default_db_path() -> String {
    "murmur.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    4
}

fn default_presence_interval_ms() -> u64 {
    1_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            silence_marker: default_silence_marker(),
            default_speech_limit: default_speech_limit(),
            assistant_id: default_assistant_id(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            dictionary_dir: default_dictionary_dir(),
            profile_path: default_profile_path(),
            audio_dir: default_audio_dir(),
            database_path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_presence_interval_ms(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is not usable.
    #[error("invalid config value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl Config {
    /// Checks cross-field constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first bad key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot.prefix.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "bot.prefix",
                reason: "must not be empty".to_string(),
            });
        }
        validate_speech_limit(self.bot.default_speech_limit as i64).map_err(|e| {
            ConfigError::Invalid {
                key: "bot.default_speech_limit",
                reason: e.to_string(),
            }
        })?;
        if self.presence.interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "presence.interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `MURMUR_PREFIX` overrides `bot.prefix`
/// - `MURMUR_HOST` / `MURMUR_PORT` override `server.host` / `server.port`
/// - `MURMUR_LOG_LEVEL` overrides `logging.level`
/// - `MURMUR_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `MURMUR_OPEN_JTALK` overrides `engine.binary`
/// - `MURMUR_OPEN_JTALK_DIC` overrides `engine.dictionary_dir`
/// - `MURMUR_OPEN_JTALK_VOICE` overrides `engine.voice_model`
/// - `MURMUR_DB_PATH` overrides `storage.database_path`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed, or
/// if the resulting configuration fails [`Config::validate`].
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(prefix) = var("MURMUR_PREFIX") {
        config.bot.prefix = prefix;
    }
    if let Some(host) = var("MURMUR_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = var("MURMUR_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(level) = var("MURMUR_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("MURMUR_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(binary) = var("MURMUR_OPEN_JTALK") {
        config.engine.binary = binary.into();
    }
    if let Some(dic) = var("MURMUR_OPEN_JTALK_DIC") {
        config.engine.dictionary_dir = dic.into();
    }
    if let Some(voice) = var("MURMUR_OPEN_JTALK_VOICE") {
        config.engine.voice_model = voice.into();
    }
    if let Some(db_path) = var("MURMUR_DB_PATH") {
        config.storage.database_path = db_path;
    }
}
