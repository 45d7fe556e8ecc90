//! Chat text to speakable text.
//!
//! The pipeline runs in a fixed order:
//!
//! 1. guild dictionary substitution, in stored order
//! 2. hazard filter (custom emoji, mentions, links, code fences)
//! 3. markup stripping (`! ? { } < >`)
//! 4. truncation at the first newline
//! 5. spoiler redaction
//! 6. clamp to the session's character limit
//!
//! Substitution runs before the hazard filter, so a dictionary entry can
//! defuse a marker (`http` → `h t t p`) but can never smuggle one past it.

use crate::config::SpeechPhrases;
use murmur_types::DictionaryEntry;
use regex::Regex;
use std::sync::OnceLock;

/// Substrings that make a message unsuitable to read aloud.
const HAZARD_PATTERN: &str = r"<a:|<:|<@|<#|<@&|http|```";

const SPOILER_PATTERN: &str = r"\|\|.*?\|\|";

const MARKUP_CHARS: [char; 6] = ['!', '?', '{', '}', '<', '>'];

fn hazard_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(HAZARD_PATTERN).expect("hazard pattern is valid"))
}

fn spoiler_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(SPOILER_PATTERN).expect("spoiler pattern is valid"))
}

/// Pure text pipeline shared by every guild.
#[derive(Debug, Clone)]
pub struct TextSanitizer {
    filler: String,
    redaction: String,
}

impl Default for TextSanitizer {
    fn default() -> Self {
        Self::new(&SpeechPhrases::default())
    }
}

impl TextSanitizer {
    pub fn new(phrases: &SpeechPhrases) -> Self {
        Self {
            filler: phrases.filler.clone(),
            redaction: phrases.redaction.clone(),
        }
    }

    pub fn filler(&self) -> &str {
        &self.filler
    }

    /// Returns `true` if `text` contains anything the hazard filter rejects.
    pub fn is_hazardous(text: &str) -> bool {
        hazard_regex().is_match(text)
    }

    /// Runs the full pipeline. Never fails; the result holds at most
    /// `limit` characters and may be empty.
    pub fn sanitize(&self, raw: &str, dictionary: &[DictionaryEntry], limit: usize) -> String {
        let mut text = raw.to_string();
        for entry in dictionary {
            if text.contains(&entry.from) {
                text = text.replace(&entry.from, &entry.to);
            }
        }

        if Self::is_hazardous(&text) {
            text = self.filler.clone();
        }

        text.retain(|c| !MARKUP_CHARS.contains(&c));

        if let Some(idx) = text.find('\n') {
            text.truncate(idx);
        }

        if text.contains("||") {
            text = spoiler_regex()
                .replace_all(&text, regex::NoExpand(&self.redaction))
                .into_owned();
        }

        text.chars().take(limit).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitizer() -> TextSanitizer {
        TextSanitizer::new(&SpeechPhrases {
            filler: "skip".to_string(),
            redaction: "beep".to_string(),
            ..SpeechPhrases::default()
        })
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(sanitizer().sanitize("Hello", &[], 50), "Hello");
    }

    #[test]
    fn hazards_become_filler_regardless_of_dictionary() {
        let s = sanitizer();
        let dict = [DictionaryEntry::new("look", "see")];
        for raw in [
            "look <a:party:123>",
            "<:smile:42>",
            "hi <@1234>",
            "<@!1234>",
            "go to <#5678>",
            "ping <@&999>",
            "look https://example.com",
            "```rust\nfn main() {}\n```",
        ] {
            assert_eq!(s.sanitize(raw, &dict, 50), "skip", "input {raw:?}");
        }
    }

    #[test]
    fn dictionary_runs_before_hazard_filter() {
        let s = sanitizer();

        // Substitution defuses the marker, so the text is spoken.
        let defuse = [DictionaryEntry::new("http", "h t t p")];
        assert_eq!(s.sanitize("about http", &defuse, 50), "about h t t p");

        // Substitution can also introduce a marker, which is then caught.
        let inject = [DictionaryEntry::new("link", "http")];
        assert_eq!(s.sanitize("a link", &inject, 50), "skip");
    }

    #[test]
    fn dictionary_applies_in_order() {
        let dict = [DictionaryEntry::new("a", "b"), DictionaryEntry::new("b", "c")];
        assert_eq!(sanitizer().sanitize("a", &dict, 50), "c");

        let reversed = [DictionaryEntry::new("b", "c"), DictionaryEntry::new("a", "b")];
        assert_eq!(sanitizer().sanitize("a", &reversed, 50), "b");
    }

    #[test]
    fn markup_is_stripped() {
        assert_eq!(sanitizer().sanitize("wow! {really}?", &[], 50), "wow really");
        assert_eq!(sanitizer().sanitize("a > b", &[], 50), "a  b");
    }

    #[test]
    fn stops_at_first_newline() {
        assert_eq!(sanitizer().sanitize("first\nsecond\nthird", &[], 50), "first");
        assert_eq!(sanitizer().sanitize("\nhidden", &[], 50), "");
    }

    #[test]
    fn spoilers_are_redacted_shortest_span() {
        let s = sanitizer();
        assert_eq!(s.sanitize("the ||butler|| did it", &[], 50), "the beep did it");
        assert_eq!(
            s.sanitize("||a|| and ||b||", &[], 50),
            "beep and beep"
        );
        assert_eq!(s.sanitize("unclosed || pipe", &[], 50), "unclosed || pipe");
    }

    #[test]
    fn redaction_text_is_literal() {
        let s = TextSanitizer::new(&SpeechPhrases {
            redaction: "$0".to_string(),
            ..SpeechPhrases::default()
        });
        assert_eq!(s.sanitize("||x||", &[], 50), "$0");
    }

    #[test]
    fn clamps_by_codepoints() {
        let s = sanitizer();
        assert_eq!(s.sanitize("こんにちは世界", &[], 5), "こんにちは");
        assert_eq!(s.sanitize("abc", &[], 1), "a");
        assert_eq!(s.sanitize("abc", &[], 0), "");
    }

    #[test]
    fn output_never_exceeds_limit() {
        let s = sanitizer();
        let inputs = [
            "",
            "short",
            "a much longer message that goes on and on and on and on",
            "絵文字😀を含むとても長いメッセージです。まだまだ続きます。",
            "http://x",
            "||spoiler|| text",
        ];
        for raw in inputs {
            for limit in [1usize, 2, 3, 10, 50, 100] {
                let out = s.sanitize(raw, &[], limit);
                assert!(out.chars().count() <= limit, "{raw:?} @ {limit} -> {out:?}");
            }
        }
    }

    #[test]
    fn filler_is_clamped_like_any_other_text() {
        assert_eq!(sanitizer().sanitize("<@1>", &[], 2), "sk");
    }
}
