//! In-process voice transport.
//!
//! Keeps voice-channel membership in memory and "plays" audio by logging
//! the waveform path. The console binary drives it from stdin; the test
//! suites use its failure switches and, with [`LoopbackAdapter::with_recording`],
//! its playback log.

use crate::adapter::{VoiceAdapter, VoiceConnection};
use crate::error::VoiceError;
use async_trait::async_trait;
use murmur_types::{ChannelId, GuildId, UserId};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::info;

/// One finished playback.
#[derive(Debug, Clone)]
pub struct PlaybackRecord {
    pub guild_id: GuildId,
    pub path: PathBuf,
    /// Waveform contents at the time of playback.
    pub audio: Vec<u8>,
    pub started: Instant,
    pub finished: Instant,
}

#[derive(Debug, Default)]
struct LoopbackState {
    voice_states: HashMap<(GuildId, UserId), ChannelId>,
    connected: HashMap<GuildId, ChannelId>,
    playbacks: Vec<PlaybackRecord>,
    disconnects: usize,
    fail_disconnect: bool,
    fail_playback: bool,
}

#[derive(Debug)]
pub struct LoopbackAdapter {
    assistant: UserId,
    playback_delay: Duration,
    recording: bool,
    state: Mutex<LoopbackState>,
}

impl LoopbackAdapter {
    pub fn new(assistant: impl Into<UserId>) -> Self {
        Self {
            assistant: assistant.into(),
            playback_delay: Duration::ZERO,
            recording: false,
            state: Mutex::new(LoopbackState::default()),
        }
    }

    /// Makes every playback take `delay` of wall-clock time.
    pub fn with_playback_delay(mut self, delay: Duration) -> Self {
        self.playback_delay = delay;
        self
    }

    /// Keeps a [`PlaybackRecord`] (including the waveform bytes) for every
    /// playback. Off by default: the log is never drained.
    pub fn with_recording(mut self) -> Self {
        self.recording = true;
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, LoopbackState> {
        // A panic while holding this lock can only come from a test
        // assertion; keep serving the data.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Moves `user` into `channel` (or out of voice with `None`).
    pub fn set_voice_state(&self, guild: &GuildId, user: &UserId, channel: Option<ChannelId>) {
        let mut state = self.state();
        let key = (guild.clone(), user.clone());
        match channel {
            Some(channel) => {
                state.voice_states.insert(key, channel);
            }
            None => {
                state.voice_states.remove(&key);
            }
        }
    }

    pub fn set_fail_disconnect(&self, fail: bool) {
        self.state().fail_disconnect = fail;
    }

    pub fn set_fail_playback(&self, fail: bool) {
        self.state().fail_playback = fail;
    }

    /// Playbacks logged so far; always empty unless built
    /// [`with_recording`](Self::with_recording).
    pub fn playbacks(&self) -> Vec<PlaybackRecord> {
        self.state().playbacks.clone()
    }

    pub fn disconnect_count(&self) -> usize {
        self.state().disconnects
    }

    pub fn is_connected(&self, guild: &GuildId) -> bool {
        self.state().connected.contains_key(guild)
    }
}

#[async_trait]
impl VoiceAdapter for LoopbackAdapter {
    fn assistant_id(&self) -> UserId {
        self.assistant.clone()
    }

    async fn join_channel(
        &self,
        guild: &GuildId,
        user: &UserId,
    ) -> Result<VoiceConnection, VoiceError> {
        let mut state = self.state();
        let channel = state
            .voice_states
            .get(&(guild.clone(), user.clone()))
            .cloned()
            .ok_or_else(|| {
                VoiceError::Join(format!("user {} is not in a voice channel of {}", user, guild))
            })?;
        state.connected.insert(guild.clone(), channel.clone());
        info!(guild_id = %guild, channel_id = %channel, "loopback voice connected");
        Ok(VoiceConnection {
            guild_id: guild.clone(),
            channel_id: channel,
        })
    }

    async fn disconnect(&self, connection: &VoiceConnection) -> Result<(), VoiceError> {
        let mut state = self.state();
        if state.fail_disconnect {
            return Err(VoiceError::Adapter("disconnect refused".to_string()));
        }
        state.connected.remove(&connection.guild_id);
        state.disconnects += 1;
        info!(guild_id = %connection.guild_id, "loopback voice disconnected");
        Ok(())
    }

    async fn play_audio(
        &self,
        connection: &VoiceConnection,
        path: &Path,
    ) -> Result<(), VoiceError> {
        {
            let state = self.state();
            if state.fail_playback {
                return Err(VoiceError::Adapter("playback failed".to_string()));
            }
            if state.connected.get(&connection.guild_id) != Some(&connection.channel_id) {
                return Err(VoiceError::Adapter(format!(
                    "not connected in {}",
                    connection.guild_id
                )));
            }
        }

        let open_err =
            |e: std::io::Error| VoiceError::Adapter(format!("cannot open {:?}: {}", path, e));
        let audio = if self.recording {
            Some(tokio::fs::read(path).await.map_err(open_err)?)
        } else {
            None
        };
        let bytes = match &audio {
            Some(audio) => audio.len() as u64,
            None => tokio::fs::metadata(path).await.map_err(open_err)?.len(),
        };

        let started = Instant::now();
        if !self.playback_delay.is_zero() {
            tokio::time::sleep(self.playback_delay).await;
        }
        info!(
            guild_id = %connection.guild_id,
            path = ?path,
            bytes,
            "loopback playback"
        );

        let Some(audio) = audio else {
            return Ok(());
        };
        self.state().playbacks.push(PlaybackRecord {
            guild_id: connection.guild_id.clone(),
            path: path.to_path_buf(),
            audio,
            started,
            finished: Instant::now(),
        });
        Ok(())
    }

    async fn current_occupants(&self, channel: &ChannelId) -> Result<HashSet<UserId>, VoiceError> {
        let state = self.state();
        let mut occupants: HashSet<UserId> = state
            .voice_states
            .iter()
            .filter(|(_, c)| *c == channel)
            .map(|((_, user), _)| user.clone())
            .collect();
        if state.connected.values().any(|c| c == channel) {
            occupants.insert(self.assistant.clone());
        }
        Ok(occupants)
    }

    fn is_ready(&self, connection: &VoiceConnection) -> bool {
        self.state().connected.get(&connection.guild_id) == Some(&connection.channel_id)
    }
}
