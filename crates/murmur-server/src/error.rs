use murmur_store::StoreError;
use murmur_types::{GuildId, ValidationError};
use murmur_voice::VoiceError;
use thiserror::Error;

/// Errors raised by session operations and the synthesis pipeline.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Malformed command arguments or an out-of-range setting.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// No session exists for the guild.
    #[error("no active session for guild {0}")]
    NotFound(GuildId),

    /// A session (or a join in progress) already exists for the guild.
    #[error("guild {0} already has an active session")]
    AlreadyJoined(GuildId),

    /// Profile or dictionary storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// The synthesis process failed or produced no waveform.
    #[error("engine error: {0}")]
    Engine(#[source] VoiceError),

    /// The voice transport refused the connection.
    #[error("voice join failed: {0}")]
    VoiceJoin(#[source] VoiceError),

    /// Disconnect or playback failed.
    #[error("voice adapter error: {0}")]
    VoiceAdapter(#[source] VoiceError),
}

impl SessionError {
    /// Classifies a transport or engine error by the variant it carries.
    pub fn from_voice(err: VoiceError) -> Self {
        match err {
            VoiceError::Join(_) => Self::VoiceJoin(err),
            VoiceError::Engine(_) => Self::Engine(err),
            VoiceError::Adapter(_) => Self::VoiceAdapter(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_errors_are_classified() {
        assert!(matches!(
            SessionError::from_voice(VoiceError::Join("x".into())),
            SessionError::VoiceJoin(_)
        ));
        assert!(matches!(
            SessionError::from_voice(VoiceError::Engine("x".into())),
            SessionError::Engine(_)
        ));
        assert!(matches!(
            SessionError::from_voice(VoiceError::Adapter("x".into())),
            SessionError::VoiceAdapter(_)
        ));
    }

    #[test]
    fn validation_passes_through() {
        let err: SessionError = ValidationError::OutOfRange {
            field: "limit",
            value: 0.0,
            min: 1.0,
            max: 100.0,
        }
        .into();
        assert!(err.to_string().contains("limit"));
    }
}
