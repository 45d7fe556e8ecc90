use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    /// The requesting user is not in a voice channel, or the transport
    /// refused the connection.
    #[error("voice join error: {0}")]
    Join(String),

    /// Disconnect, playback, or occupancy query failed.
    #[error("voice adapter error: {0}")]
    Adapter(String),

    /// The synthesis engine failed or produced no waveform.
    #[error("synthesis engine error: {0}")]
    Engine(String),
}
