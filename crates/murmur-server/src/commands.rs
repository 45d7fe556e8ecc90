//! Chat command surface.
//!
//! Every inbound chat message goes through [`handle_message`]: it is either
//! a prefixed command, answered with reaction markers and an optional
//! embed, or ambient speech read aloud in the guild's session.

use crate::error::SessionError;
use crate::AppState;
use murmur_types::{ChannelId, GuildId, UserId, UserVoiceProfile, ValidationError};
use serde::Serialize;
use tracing::{debug, warn};

/// A chat message as delivered by the gateway.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub author_id: UserId,
    /// Display name, used in the `get` embed title.
    pub author_name: String,
    pub author_is_bot: bool,
    pub content: String,
}

/// Reaction marker added to the triggering message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reaction {
    Failed,
    Joined,
    Left,
    ProfileUpdated,
    LimitUpdated,
    WordAdded,
    BotEcho,
    EchoOn,
    EchoOff,
}

impl Reaction {
    pub fn marker(self) -> &'static str {
        match self {
            Self::Failed => "❌",
            Self::Joined => "✅",
            Self::Left => "⛔",
            Self::ProfileUpdated => "🔊",
            Self::LimitUpdated => "🥺",
            Self::WordAdded => "📄",
            Self::BotEcho => "🤖",
            Self::EchoOn => "🔈",
            Self::EchoOff => "🔇",
        }
    }
}

/// Rich message posted back to the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
}

/// Presentation the gateway should apply for one message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Feedback {
    pub reactions: Vec<Reaction>,
    pub embed: Option<Embed>,
}

impl Feedback {
    fn react(reactions: impl IntoIterator<Item = Reaction>) -> Self {
        Self {
            reactions: reactions.into_iter().collect(),
            embed: None,
        }
    }

    fn failed() -> Self {
        Self::react([Reaction::Failed])
    }

    fn embed(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            reactions: Vec::new(),
            embed: Some(Embed {
                title: title.into(),
                description: description.into(),
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.reactions.is_empty() && self.embed.is_none()
    }
}

/// A recognized command with its raw argument text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    Join,
    Leave,
    Get,
    Set(&'a str),
    Limit(&'a str),
    Word(&'a str),
    Bot,
    Help,
}

/// Matches `<prefix> <command>[ <args>]`. Returns `None` for anything that
/// is not a command, including unknown command words.
pub fn parse_command<'a>(prefix: &str, content: &'a str) -> Option<Command<'a>> {
    let rest = content.strip_prefix(prefix)?.strip_prefix(' ')?;
    let (word, args) = match rest.split_once(' ') {
        Some((word, args)) => (word, Some(args)),
        None => (rest, None),
    };

    match (word, args) {
        ("join", _) => Some(Command::Join),
        ("leave", _) => Some(Command::Leave),
        ("get", _) => Some(Command::Get),
        ("bot", _) => Some(Command::Bot),
        ("help", _) => Some(Command::Help),
        ("set", Some(args)) => Some(Command::Set(args)),
        ("limit", Some(args)) => Some(Command::Limit(args)),
        ("word", Some(args)) => Some(Command::Word(args)),
        _ => None,
    }
}

/// Parses `<alpha> <speed> <pitch> <accent>`.
///
/// # Errors
///
/// `ValidationError::InvalidFormat` unless there are exactly four numbers.
pub fn parse_profile_args(args: &str) -> Result<UserVoiceProfile, ValidationError> {
    let invalid = || ValidationError::InvalidFormat(args.to_string());
    let values = args
        .split_whitespace()
        .map(|v| v.parse::<f64>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()?;

    match values.as_slice() {
        [alpha, speed, pitch, accent] => Ok(UserVoiceProfile::new(*alpha, *speed, *pitch, *accent)),
        _ => Err(invalid()),
    }
}

fn parse_limit_arg(args: &str) -> Result<i64, ValidationError> {
    args.trim()
        .parse()
        .map_err(|_| ValidationError::InvalidFormat(args.to_string()))
}

/// Handles one inbound message and returns the feedback to present.
///
/// Ambient speech never produces feedback; its failures are logged and the
/// utterance is dropped.
pub async fn handle_message(state: &AppState, message: &ChatMessage) -> Feedback {
    if !state.silence_marker.is_empty() && message.content.starts_with(&state.silence_marker) {
        return Feedback::default();
    }

    if let Some(command) = parse_command(&state.prefix, &message.content) {
        return match run_command(state, message, &command).await {
            Ok(feedback) => feedback,
            Err(e) => {
                warn!(
                    guild_id = %message.guild_id,
                    user_id = %message.author_id,
                    command = ?command,
                    error = %e,
                    "command failed"
                );
                Feedback::failed()
            }
        };
    }

    speak_ambient(state, message).await;
    Feedback::default()
}

async fn run_command(
    state: &AppState,
    message: &ChatMessage,
    command: &Command<'_>,
) -> Result<Feedback, SessionError> {
    match command {
        Command::Join => {
            state
                .join(&message.guild_id, &message.channel_id, &message.author_id)
                .await?;
            Ok(Feedback::react([Reaction::Joined]))
        }
        Command::Leave => {
            let session = state.registry.lookup(&message.guild_id)?;
            if session.text_channel() != &message.channel_id {
                return Ok(Feedback::failed());
            }
            // A concurrent leave may have closed the session while this one
            // waited on its lock.
            if !state.leave(&session).await? {
                return Err(SessionError::NotFound(message.guild_id.clone()));
            }
            Ok(Feedback::react([Reaction::Left]))
        }
        Command::Get => {
            let profile = state.profiles.get_or_default(&message.author_id).await?;
            Ok(Feedback::embed(
                format!("@{}'s Speech Config", message.author_name),
                format!(
                    "Alpha:  {}\nSpeed:  {}\nPitch:  {}\nAccent: {}",
                    profile.alpha, profile.speed, profile.pitch, profile.accent
                ),
            ))
        }
        Command::Set(args) => {
            let candidate = parse_profile_args(args)?;
            state
                .profiles
                .set_profile(&message.author_id, candidate)
                .await?;
            Ok(Feedback::react([Reaction::ProfileUpdated]))
        }
        Command::Limit(args) => {
            let session = state.registry.lookup(&message.guild_id)?;
            if session.text_channel() != &message.channel_id {
                return Ok(Feedback::failed());
            }
            state.set_speech_limit(&message.guild_id, parse_limit_arg(args)?)?;
            Ok(Feedback::react([Reaction::LimitUpdated]))
        }
        Command::Word(args) => {
            state.dictionary.add_entry(&message.guild_id, args).await?;
            Ok(Feedback::react([Reaction::WordAdded]))
        }
        Command::Bot => {
            let echo = if state.toggle_bot_echo(&message.guild_id)? {
                Reaction::EchoOn
            } else {
                Reaction::EchoOff
            };
            Ok(Feedback::react([Reaction::BotEcho, echo]))
        }
        Command::Help => Ok(Feedback::embed("BOT HELP", help_text(&state.prefix))),
    }
}

fn help_text(prefix: &str) -> String {
    format!(
        "--TTS--\n\
         {p} join : join your voice channel\n\
         {p} get : show your voice settings\n\
         {p} set <alpha 0-1> <speed 0.1-10> <pitch -50-50> <accent 0-50> : change your voice settings\n\
         {p} word <from>,<to> : add a word to this server's dictionary\n\
         {p} limit <1-100> : set how many characters are read per message\n\
         {p} bot : toggle reading messages from bots\n\
         {p} leave : leave the voice channel\n",
        p = prefix
    )
}

async fn speak_ambient(state: &AppState, message: &ChatMessage) {
    let Ok(session) = state.registry.lookup(&message.guild_id) else {
        return;
    };
    if session.text_channel() != &message.channel_id {
        return;
    }
    if message.author_is_bot && !session.bot_echo() {
        return;
    }

    match state
        .dispatcher
        .synthesize(&session, &message.author_id, &message.content)
        .await
    {
        Ok(outcome) => debug!(guild_id = %message.guild_id, ?outcome, "ambient speech done"),
        Err(e) => warn!(
            guild_id = %message.guild_id,
            user_id = %message.author_id,
            error = %e,
            "dropped utterance"
        ),
    }
}
