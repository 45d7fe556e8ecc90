//! Shared types, error definitions, and constants for murmur.
//!
//! This crate provides the identifiers, voice profile model, dictionary
//! records, and validation errors used by every other crate in the
//! workspace. It has no I/O of its own.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub mod voice;

pub use voice::{ProfileField, UserVoiceProfile};

/// Lowest accepted per-session speech character limit.
pub const MIN_SPEECH_LIMIT: usize = 1;
/// Highest accepted per-session speech character limit.
pub const MAX_SPEECH_LIMIT: usize = 100;
/// Speech character limit assigned to a freshly joined session.
pub const DEFAULT_SPEECH_LIMIT: usize = 50;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Identifier of a guild, the unit of session isolation.
    GuildId
);
string_id!(
    /// Identifier of a text or voice channel.
    ChannelId
);
string_id!(
    /// Identifier of a chat account.
    UserId
);

impl UserId {
    /// Reserved identifier that voices join/leave greetings.
    ///
    /// Chat platforms hand out numeric snowflakes, so this can never collide
    /// with a real account.
    pub const SYSTEM: &'static str = "BOT";

    /// Returns the reserved system speaker.
    pub fn system() -> Self {
        Self(Self::SYSTEM.to_string())
    }

    /// Returns `true` if this is the reserved system speaker.
    pub fn is_system(&self) -> bool {
        self.0 == Self::SYSTEM
    }
}

/// A single word substitution belonging to a guild dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    /// Literal text to search for.
    pub from: String,
    /// Replacement text.
    pub to: String,
}

impl DictionaryEntry {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Parses a raw `from,to` pair as typed by a user.
    ///
    /// The input must contain exactly one `,` with a non-empty token on each
    /// side. Surrounding whitespace is trimmed from both tokens.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidFormat`] for anything else.
    pub fn parse_pair(raw: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidFormat(raw.to_string());

        let mut parts = raw.split(',');
        let from = parts.next().map(str::trim).ok_or_else(invalid)?;
        let to = parts.next().map(str::trim).ok_or_else(invalid)?;
        if parts.next().is_some() || from.is_empty() || to.is_empty() {
            return Err(invalid());
        }
        if from.contains('\n') || to.contains('\n') {
            return Err(invalid());
        }

        Ok(Self::new(from, to))
    }
}

/// Errors produced when user-supplied settings fail validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A numeric setting fell outside its declared bounds.
    #[error("{field} is out of range: {value} (expected {min} ..= {max})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Input could not be parsed into the expected shape.
    #[error("invalid format: {0:?}")]
    InvalidFormat(String),
}

impl ValidationError {
    /// Name of the offending field, if this is a range error.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::OutOfRange { field, .. } => Some(field),
            Self::InvalidFormat(_) => None,
        }
    }
}

/// Validates a requested speech character limit.
///
/// # Errors
///
/// Returns [`ValidationError::OutOfRange`] unless `limit` lies in
/// [`MIN_SPEECH_LIMIT`]`..=`[`MAX_SPEECH_LIMIT`].
pub fn validate_speech_limit(limit: i64) -> Result<usize, ValidationError> {
    if limit < MIN_SPEECH_LIMIT as i64 || limit > MAX_SPEECH_LIMIT as i64 {
        return Err(ValidationError::OutOfRange {
            field: "limit",
            value: limit as f64,
            min: MIN_SPEECH_LIMIT as f64,
            max: MAX_SPEECH_LIMIT as f64,
        });
    }
    Ok(limit as usize)
}
