//! Voice side of murmur.
//!
//! Turns chat text into speakable text ([`TextSanitizer`]), renders it to a
//! waveform with an external synthesis process ([`OpenJTalkEngine`]), and
//! defines the capability set murmur needs from a voice transport
//! ([`VoiceAdapter`]).
//!
//! The transport itself lives outside this workspace. [`LoopbackAdapter`] is
//! an in-process stand-in used by the console binary and the test suites.

pub mod adapter;
pub mod config;
pub mod engine;
pub mod error;
pub mod loopback;
pub mod sanitize;

pub use adapter::{VoiceAdapter, VoiceConnection};
pub use config::{EngineConfig, SpeechPhrases};
pub use engine::{OpenJTalkEngine, SpeechEngine};
pub use error::VoiceError;
pub use loopback::LoopbackAdapter;
pub use sanitize::TextSanitizer;
