//! Join and leave.

use crate::error::SessionError;
use crate::session::GuildSession;
use crate::AppState;
use murmur_types::{ChannelId, GuildId, UserId};
use std::sync::Arc;
use tracing::{info, warn};

impl AppState {
    /// Connects to `user`'s voice channel and starts a session bound to
    /// `text_channel`, then greets the channel in the system voice.
    ///
    /// A failed greeting is logged; the session stays up.
    ///
    /// # Errors
    ///
    /// - `SessionError::AlreadyJoined` if the guild has a session or a join
    ///   in progress
    /// - `SessionError::VoiceJoin` if the transport cannot connect
    pub async fn join(
        &self,
        guild: &GuildId,
        text_channel: &ChannelId,
        user: &UserId,
    ) -> Result<Arc<GuildSession>, SessionError> {
        let reservation = self.registry.reserve(guild)?;

        let connection = self
            .adapter
            .join_channel(guild, user)
            .await
            .map_err(SessionError::VoiceJoin)?;

        let session = Arc::new(GuildSession::new(
            text_channel.clone(),
            connection,
            self.default_speech_limit,
        ));
        reservation.commit(Arc::clone(&session));

        info!(
            guild_id = %guild,
            session_id = %session.id(),
            text_channel_id = %text_channel,
            voice_channel_id = %session.connection().channel_id,
            "joined voice channel"
        );

        if let Err(e) = self
            .dispatcher
            .synthesize(&session, &UserId::system(), &self.phrases.greeting)
            .await
        {
            warn!(guild_id = %guild, error = %e, "failed to speak greeting");
        }

        Ok(session)
    }

    /// Says goodbye, disconnects, and removes the session.
    ///
    /// Runs entirely under the session's synthesis lock, so it waits for an
    /// utterance in progress. The farewell is spoken at most once per
    /// session, even across retries. Returns `Ok(false)` if the session had
    /// already left.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::VoiceAdapter` if the disconnect fails. The
    /// session then stays registered and a later leave retries.
    pub async fn leave(&self, session: &GuildSession) -> Result<bool, SessionError> {
        let guard = session.lock_synthesis().await;
        if session.is_closed() {
            return Ok(false);
        }

        if session.take_farewell(&guard) {
            if let Err(e) = self
                .dispatcher
                .synthesize_locked(session, &guard, &UserId::system(), &self.phrases.farewell)
                .await
            {
                warn!(guild_id = %session.guild_id(), error = %e, "failed to speak farewell");
            }
        }

        if let Err(e) = self.adapter.disconnect(session.connection()).await {
            warn!(
                guild_id = %session.guild_id(),
                session_id = %session.id(),
                error = %e,
                "disconnect failed, session kept"
            );
            return Err(SessionError::VoiceAdapter(e));
        }

        session.mark_closed(&guard);
        self.registry.unregister(session.guild_id());
        drop(guard);

        info!(
            guild_id = %session.guild_id(),
            session_id = %session.id(),
            "left voice channel"
        );
        Ok(true)
    }

    /// Leaves the session of `guild`.
    ///
    /// # Errors
    ///
    /// `SessionError::NotFound` if there is none, otherwise as [`leave`](Self::leave).
    pub async fn leave_guild(&self, guild: &GuildId) -> Result<bool, SessionError> {
        let session = self.registry.lookup(guild)?;
        self.leave(&session).await
    }

    /// # Errors
    ///
    /// `SessionError::NotFound` or `SessionError::Validation`.
    pub fn set_speech_limit(&self, guild: &GuildId, limit: i64) -> Result<usize, SessionError> {
        let session = self.registry.lookup(guild)?;
        let limit = session.set_speech_limit(limit)?;
        info!(guild_id = %guild, limit, "speech limit changed");
        Ok(limit)
    }

    /// Flips bot echo for the session of `guild` and returns the new value.
    ///
    /// # Errors
    ///
    /// `SessionError::NotFound` if there is no session.
    pub fn toggle_bot_echo(&self, guild: &GuildId) -> Result<bool, SessionError> {
        let session = self.registry.lookup(guild)?;
        let enabled = session.toggle_bot_echo();
        info!(guild_id = %guild, enabled, "bot echo toggled");
        Ok(enabled)
    }

    /// Leaves every active session. Used on shutdown; failures are logged.
    pub async fn leave_all(&self) {
        let sessions = self.registry.snapshot();
        if sessions.is_empty() {
            return;
        }
        info!(count = sessions.len(), "leaving all sessions");
        for session in sessions {
            if let Err(e) = self.leave(&session).await {
                warn!(guild_id = %session.guild_id(), error = %e, "failed to leave on shutdown");
            }
        }
    }
}
