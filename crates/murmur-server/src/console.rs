//! Stdin chat gateway.
//!
//! Lets the assistant run without a chat service. Each input line is one of:
//!
//! - `<guild> <channel> <user> <text>`: a chat message
//! - `/bot <guild> <channel> <user> <text>`: a chat message from a bot account
//! - `/voice <guild> <user> <channel>`: `user` moves into voice channel
//!   `channel` (`-` leaves voice)
//!
//! Feedback is written to stdout, one line per message.

use crate::commands::{handle_message, ChatMessage, Feedback};
use crate::AppState;
use murmur_types::{ChannelId, GuildId, UserId, ValidationError};
use murmur_voice::LoopbackAdapter;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinSet;

/// One parsed console line.
#[derive(Debug, Clone)]
pub enum ConsoleInput {
    Message(ChatMessage),
    VoiceState {
        guild_id: GuildId,
        user_id: UserId,
        channel_id: Option<ChannelId>,
    },
    Blank,
}

/// Parses a console line.
///
/// # Errors
///
/// `ValidationError::InvalidFormat` if the line has too few fields.
pub fn parse_line(line: &str) -> Result<ConsoleInput, ValidationError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(ConsoleInput::Blank);
    }
    let invalid = || ValidationError::InvalidFormat(line.to_string());

    if let Some(rest) = line.strip_prefix("/voice ") {
        let fields: Vec<&str> = rest.split_whitespace().collect();
        let [guild, user, channel] = fields.as_slice() else {
            return Err(invalid());
        };
        return Ok(ConsoleInput::VoiceState {
            guild_id: GuildId::from(*guild),
            user_id: UserId::from(*user),
            channel_id: (*channel != "-").then(|| ChannelId::from(*channel)),
        });
    }

    let (author_is_bot, rest) = match line.strip_prefix("/bot ") {
        Some(rest) => (true, rest),
        None => (false, line),
    };

    let mut fields = rest.splitn(4, ' ');
    let (Some(guild), Some(channel), Some(user), Some(text)) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(invalid());
    };
    if guild.is_empty() || channel.is_empty() || user.is_empty() {
        return Err(invalid());
    }

    Ok(ConsoleInput::Message(ChatMessage {
        guild_id: GuildId::from(guild),
        channel_id: ChannelId::from(channel),
        author_id: UserId::from(user),
        author_name: user.to_string(),
        author_is_bot,
        content: text.to_string(),
    }))
}

/// Formats feedback for the terminal.
pub fn render_feedback(message: &ChatMessage, feedback: &Feedback) -> String {
    let mut out = format!("[{}/{}]", message.guild_id, message.channel_id);
    for reaction in &feedback.reactions {
        out.push(' ');
        out.push_str(reaction.marker());
    }
    if let Some(embed) = &feedback.embed {
        out.push_str("\n== ");
        out.push_str(&embed.title);
        out.push_str(" ==\n");
        out.push_str(embed.description.trim_end());
    }
    out
}

/// Reads lines from `input` until EOF, handling messages concurrently.
/// Waits for in-flight messages before returning.
///
/// # Errors
///
/// Returns the I/O error that ended reading.
pub async fn run<R>(state: AppState, voice: Arc<LoopbackAdapter>, input: R) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut in_flight = JoinSet::new();

    while let Some(line) = lines.next_line().await? {
        match parse_line(&line) {
            Ok(ConsoleInput::Blank) => {}
            Ok(ConsoleInput::VoiceState {
                guild_id,
                user_id,
                channel_id,
            }) => {
                tracing::debug!(guild_id = %guild_id, user_id = %user_id, channel_id = ?channel_id, "voice state update");
                voice.set_voice_state(&guild_id, &user_id, channel_id);
            }
            Ok(ConsoleInput::Message(message)) => {
                let state = state.clone();
                in_flight.spawn(async move {
                    let feedback = handle_message(&state, &message).await;
                    if !feedback.is_empty() {
                        println!("{}", render_feedback(&message, &feedback));
                    }
                });
            }
            Err(e) => tracing::warn!("ignoring console line: {}", e),
        }

        while let Some(finished) = in_flight.try_join_next() {
            if let Err(e) = finished {
                tracing::error!("console message task failed: {}", e);
            }
        }
    }

    while let Some(finished) = in_flight.join_next().await {
        if let Err(e) = finished {
            tracing::error!("console message task failed: {}", e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Embed, Reaction};

    #[test]
    fn parses_messages() {
        let ConsoleInput::Message(msg) = parse_line("g1 text u1 hello there").unwrap() else {
            panic!("expected message");
        };
        assert_eq!(msg.guild_id, GuildId::from("g1"));
        assert_eq!(msg.channel_id, ChannelId::from("text"));
        assert_eq!(msg.author_id, UserId::from("u1"));
        assert_eq!(msg.content, "hello there");
        assert!(!msg.author_is_bot);

        let ConsoleInput::Message(msg) = parse_line("/bot g1 text b1 beep").unwrap() else {
            panic!("expected message");
        };
        assert!(msg.author_is_bot);
        assert_eq!(msg.content, "beep");
    }

    #[test]
    fn parses_voice_state() {
        match parse_line("/voice g1 u1 vc").unwrap() {
            ConsoleInput::VoiceState {
                channel_id: Some(channel),
                ..
            } => assert_eq!(channel, ChannelId::from("vc")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            parse_line("/voice g1 u1 -").unwrap(),
            ConsoleInput::VoiceState { channel_id: None, .. }
        ));
        assert!(parse_line("/voice g1 u1").is_err());
    }

    #[test]
    fn rejects_short_lines() {
        assert!(matches!(parse_line("   ").unwrap(), ConsoleInput::Blank));
        assert!(parse_line("g1 text").is_err());
        assert!(parse_line("g1 text u1").is_err());
    }

    #[test]
    fn renders_markers_and_embed() {
        let ConsoleInput::Message(msg) = parse_line("g text u x").unwrap() else {
            panic!("expected message");
        };
        let feedback = Feedback {
            reactions: vec![Reaction::BotEcho, Reaction::EchoOn],
            embed: Some(Embed {
                title: "T".to_string(),
                description: "D\n".to_string(),
            }),
        };
        assert_eq!(render_feedback(&msg, &feedback), "[g/text] 🤖 🔈\n== T ==\nD");
    }
}
