use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a sent message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// CEFR proficiency level attached to a word entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
    Unknown,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::A1 => "A1",
            Level::A2 => "A2",
            Level::B1 => "B1",
            Level::B2 => "B2",
            Level::C1 => "C1",
            Level::C2 => "C2",
            Level::Unknown => "Unknown",
        }
    }

    /// Lenient parse: scraped pages and model output vary in casing, and
    /// anything unrecognizable collapses to `Unknown`.
    pub fn parse(s: &str) -> Level {
        match s.trim().to_uppercase().as_str() {
            "A1" => Level::A1,
            "A2" => Level::A2,
            "B1" => Level::B1,
            "B2" => Level::B2,
            "C1" => Level::C1,
            "C2" => Level::C2,
            _ => Level::Unknown,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for Level {
    fn default() -> Self {
        Level::Unknown
    }
}

/// A persisted dictionary fact. The shared word table is collectively owned;
/// rows are inserted and bulk-cleared, never updated in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WordEntry {
    pub id: i64,
    pub topic: String,
    pub word: String,
    pub definition: String,
    pub example: String,
    pub pronunciation: String,
    pub level: Level,
    pub source: String,
}

/// An entry ready for insertion. The store drops rows with an empty
/// definition; everything else is persisted as-is.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewWordEntry {
    pub topic: String,
    pub word: String,
    pub definition: String,
    pub example: String,
    pub pronunciation: String,
    pub level: Level,
    pub source: String,
}

pub const DEFAULT_TOPIC: &str = "General";
pub const SOURCE_MANUAL: &str = "Manual";
pub const SOURCE_AI: &str = "AI-Enhanced";

/// Per-user preferences, created lazily with defaults and never deleted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserProfile {
    pub user_id: UserId,
    pub username: Option<String>,
    pub daily_enabled: bool,
    pub daily_count: u32,
    /// Delivery time as `HH:MM` in the operating timezone.
    pub daily_time: Option<String>,
    pub daily_level: Option<Level>,
    pub daily_pos: Option<String>,
    /// Ordered provider names; `None` means the fixed default order.
    pub source_prefs: Option<Vec<String>>,
    /// Idempotency guard: once set to today, no further delivery today.
    pub last_sent_date: Option<NaiveDate>,
}

impl UserProfile {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            username: None,
            daily_enabled: false,
            daily_count: 1,
            daily_time: None,
            daily_level: None,
            daily_pos: None,
            source_prefs: None,
            last_sent_date: None,
        }
    }
}

/// Settings collected by the daily-words flow; one atomic upsert at the end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DailySettings {
    pub count: u32,
    pub time: String,
    pub level: Option<Level>,
    pub pos: Option<String>,
}

/// Build the stored title: append the part of speech parenthetically when it
/// is known and not already embedded in the word text.
pub fn display_title(word: &str, part_of_speech: Option<&str>) -> String {
    let word = word.trim();
    match part_of_speech {
        Some(pos)
            if !pos.trim().is_empty()
                && !pos.trim().eq_ignore_ascii_case("unknown")
                && !word.contains('(') =>
        {
            format!("{word} ({})", pos.trim())
        }
        _ => word.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parse_is_lenient() {
        assert_eq!(Level::parse("b2"), Level::B2);
        assert_eq!(Level::parse(" C1 "), Level::C1);
        assert_eq!(Level::parse("intermediate"), Level::Unknown);
        assert_eq!(Level::parse(""), Level::Unknown);
    }

    #[test]
    fn title_appends_pos_when_missing() {
        assert_eq!(display_title("run", Some("Verb")), "run (Verb)");
        assert_eq!(display_title("run (Verb)", Some("Verb")), "run (Verb)");
        assert_eq!(display_title("run", Some("unknown")), "run");
        assert_eq!(display_title("run", None), "run");
        assert_eq!(display_title(" drink ", Some(" Noun ")), "drink (Noun)");
    }
}
