//! Live guild sessions.

use chrono::{DateTime, Utc};
use murmur_types::{validate_speech_limit, ChannelId, GuildId, ValidationError};
use murmur_voice::VoiceConnection;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Proof that the caller holds a session's synthesis lock.
pub type SynthesisGuard<'a> = MutexGuard<'a, ()>;

/// The live binding between a guild, a text channel, and an open voice
/// connection.
///
/// Owned by the [`SessionRegistry`](crate::registry::SessionRegistry) entry
/// for its guild. Mutable settings are atomics so that commands never wait
/// behind an utterance in progress; everything that talks to the engine or
/// the voice transport goes through [`GuildSession::lock_synthesis`].
#[derive(Debug)]
pub struct GuildSession {
    id: Uuid,
    guild_id: GuildId,
    text_channel: ChannelId,
    connection: VoiceConnection,
    joined_at: DateTime<Utc>,
    speech_limit: AtomicUsize,
    bot_echo: AtomicBool,
    synthesis: Mutex<()>,
    /// Set once the voice connection has been torn down.
    closed: AtomicBool,
    farewell_spoken: AtomicBool,
    auto_leave_pending: AtomicBool,
}

impl GuildSession {
    pub fn new(text_channel: ChannelId, connection: VoiceConnection, speech_limit: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            guild_id: connection.guild_id.clone(),
            text_channel,
            connection,
            joined_at: Utc::now(),
            speech_limit: AtomicUsize::new(speech_limit),
            bot_echo: AtomicBool::new(false),
            synthesis: Mutex::new(()),
            closed: AtomicBool::new(false),
            farewell_spoken: AtomicBool::new(false),
            auto_leave_pending: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn guild_id(&self) -> &GuildId {
        &self.guild_id
    }

    /// Text channel the session was started from; only messages posted
    /// there are read aloud.
    pub fn text_channel(&self) -> &ChannelId {
        &self.text_channel
    }

    pub fn connection(&self) -> &VoiceConnection {
        &self.connection
    }

    pub fn joined_at(&self) -> DateTime<Utc> {
        self.joined_at
    }

    pub fn speech_limit(&self) -> usize {
        self.speech_limit.load(Ordering::Acquire)
    }

    /// Sets the per-utterance character limit.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::OutOfRange` unless `limit` is in `1..=100`;
    /// the current limit is kept.
    pub fn set_speech_limit(&self, limit: i64) -> Result<usize, ValidationError> {
        let limit = validate_speech_limit(limit)?;
        self.speech_limit.store(limit, Ordering::Release);
        Ok(limit)
    }

    pub fn bot_echo(&self) -> bool {
        self.bot_echo.load(Ordering::Acquire)
    }

    /// Flips whether messages from bot accounts are read aloud and returns
    /// the new setting.
    pub fn toggle_bot_echo(&self) -> bool {
        !self.bot_echo.fetch_xor(true, Ordering::AcqRel)
    }

    /// Waits for exclusive use of the session's voice pipeline.
    pub async fn lock_synthesis(&self) -> SynthesisGuard<'_> {
        self.synthesis.lock().await
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_closed(&self, _guard: &SynthesisGuard<'_>) {
        self.closed.store(true, Ordering::Release);
    }

    /// Returns `true` exactly once per session.
    pub(crate) fn take_farewell(&self, _guard: &SynthesisGuard<'_>) -> bool {
        !self.farewell_spoken.swap(true, Ordering::AcqRel)
    }

    /// Claims the right to spawn an automatic leave. Returns `false` if one
    /// is already in flight.
    pub(crate) fn try_begin_auto_leave(&self) -> bool {
        !self.auto_leave_pending.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn end_auto_leave(&self) {
        self.auto_leave_pending.store(false, Ordering::Release);
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id,
            guild_id: self.guild_id.clone(),
            text_channel_id: self.text_channel.clone(),
            voice_channel_id: self.connection.channel_id.clone(),
            speech_limit: self.speech_limit(),
            bot_echo: self.bot_echo(),
            joined_at: self.joined_at,
        }
    }
}

/// Read-only view of a session for the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    #[serde(rename = "sessionId")]
    pub session_id: Uuid,
    #[serde(rename = "guildId")]
    pub guild_id: GuildId,
    #[serde(rename = "textChannelId")]
    pub text_channel_id: ChannelId,
    #[serde(rename = "voiceChannelId")]
    pub voice_channel_id: ChannelId,
    #[serde(rename = "speechLimit")]
    pub speech_limit: usize,
    #[serde(rename = "botEcho")]
    pub bot_echo: bool,
    #[serde(rename = "joinedAt")]
    pub joined_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_types::DEFAULT_SPEECH_LIMIT;

    fn session() -> GuildSession {
        GuildSession::new(
            ChannelId::from("text"),
            VoiceConnection {
                guild_id: GuildId::from("g"),
                channel_id: ChannelId::from("voice"),
            },
            DEFAULT_SPEECH_LIMIT,
        )
    }

    #[test]
    fn speech_limit_bounds() {
        let s = session();
        assert_eq!(s.speech_limit(), 50);
        assert_eq!(s.set_speech_limit(1).unwrap(), 1);
        assert_eq!(s.set_speech_limit(100).unwrap(), 100);

        for bad in [0, 101, -5] {
            let err = s.set_speech_limit(bad).unwrap_err();
            assert_eq!(err.field(), Some("limit"));
        }
        assert_eq!(s.speech_limit(), 100);
    }

    #[test]
    fn bot_echo_toggles() {
        let s = session();
        assert!(!s.bot_echo());
        assert!(s.toggle_bot_echo());
        assert!(s.bot_echo());
        assert!(!s.toggle_bot_echo());
        assert!(!s.bot_echo());
    }

    #[tokio::test]
    async fn farewell_is_taken_once() {
        let s = session();
        let guard = s.lock_synthesis().await;
        assert!(s.take_farewell(&guard));
        assert!(!s.take_farewell(&guard));
        assert!(!s.is_closed());
        s.mark_closed(&guard);
        assert!(s.is_closed());
    }

    #[test]
    fn auto_leave_claim_is_exclusive() {
        let s = session();
        assert!(s.try_begin_auto_leave());
        assert!(!s.try_begin_auto_leave());
        s.end_auto_leave();
        assert!(s.try_begin_auto_leave());
    }

    #[test]
    fn summary_serializes_camel_case() {
        let json = serde_json::to_value(session().summary()).unwrap();
        assert_eq!(json["guildId"], "g");
        assert_eq!(json["voiceChannelId"], "voice");
        assert_eq!(json["speechLimit"], 50);
        assert_eq!(json["botEcho"], false);
    }
}
