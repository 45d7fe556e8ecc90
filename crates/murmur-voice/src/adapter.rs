//! Capability set murmur consumes from a voice transport.

use crate::error::VoiceError;
use async_trait::async_trait;
use murmur_types::{ChannelId, GuildId, UserId};
use std::collections::HashSet;
use std::path::Path;

/// Handle to an open voice connection, owned by exactly one guild session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceConnection {
    pub guild_id: GuildId,
    /// Voice channel the assistant is connected to.
    pub channel_id: ChannelId,
}

/// Voice transport operations.
///
/// Implementations wrap a real chat platform's voice gateway. All methods
/// may be called concurrently for different guilds.
#[async_trait]
pub trait VoiceAdapter: Send + Sync + 'static {
    /// Account id of the assistant itself, excluded from occupancy checks.
    fn assistant_id(&self) -> UserId;

    /// Connects to the voice channel `user` is currently in.
    ///
    /// Fails with [`VoiceError::Join`] if the user is not in a voice channel
    /// of `guild` or the connection cannot be established.
    async fn join_channel(
        &self,
        guild: &GuildId,
        user: &UserId,
    ) -> Result<VoiceConnection, VoiceError>;

    async fn disconnect(&self, connection: &VoiceConnection) -> Result<(), VoiceError>;

    /// Plays a waveform file and returns once playback has finished.
    async fn play_audio(&self, connection: &VoiceConnection, path: &Path)
        -> Result<(), VoiceError>;

    /// Users currently present in `channel`, the assistant included.
    async fn current_occupants(&self, channel: &ChannelId) -> Result<HashSet<UserId>, VoiceError>;

    /// Whether `connection` is established and usable.
    fn is_ready(&self, _connection: &VoiceConnection) -> bool {
        true
    }
}
