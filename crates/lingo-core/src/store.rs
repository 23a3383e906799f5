//! Persistence port plus a deterministic in-memory implementation.
//!
//! The SQLite implementation lives in `lingo-store`; `MemoryStore` backs the
//! engine/pipeline/scheduler tests and small deployments without a disk.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use rand::seq::SliceRandom;
use tokio::sync::Mutex;

use crate::{
    domain::{DailySettings, Level, NewWordEntry, UserId, UserProfile, WordEntry},
    Result,
};

/// Which column a search query matches against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchField {
    Word,
    Level,
    Topic,
}

/// Optional filters applied to random word selection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WordFilter {
    pub level: Option<Level>,
    /// Matched case-insensitively against the title's part-of-speech suffix.
    pub pos: Option<String>,
}

impl WordFilter {
    pub fn matches(&self, entry: &WordEntry) -> bool {
        if let Some(level) = self.level {
            if entry.level != level {
                return false;
            }
        }
        if let Some(pos) = &self.pos {
            let needle = format!("({})", pos.trim().to_lowercase());
            if !entry.word.to_lowercase().contains(&needle) {
                return false;
            }
        }
        true
    }
}

/// Shared persistence port for words and user profiles.
///
/// Word inserts from different users are independent rows; `clear_words` is
/// the only operation that must exclude concurrent inserts. Profile writes
/// are atomic per user row.
#[async_trait]
pub trait WordStore: Send + Sync {
    /// Lazily create the profile row with defaults; refresh the username.
    async fn ensure_user(&self, user: UserId, username: Option<&str>) -> Result<()>;

    /// Persist entries, silently dropping any with an empty definition.
    /// Returns the number actually inserted.
    async fn insert_words(&self, entries: &[NewWordEntry]) -> Result<usize>;

    async fn random_words(&self, filter: &WordFilter, count: u32) -> Result<Vec<WordEntry>>;

    async fn list_words(&self, limit: u32) -> Result<Vec<WordEntry>>;

    async fn search_words(&self, field: SearchField, query: &str) -> Result<Vec<WordEntry>>;

    /// Atomic bulk delete of every word row.
    async fn clear_words(&self) -> Result<u64>;

    async fn profile(&self, user: UserId) -> Result<Option<UserProfile>>;

    /// Enable daily delivery with the collected settings (insert-or-update).
    async fn upsert_daily(&self, user: UserId, settings: &DailySettings) -> Result<()>;

    async fn set_source_prefs(&self, user: UserId, prefs: &[String]) -> Result<()>;

    async fn source_prefs(&self, user: UserId) -> Result<Option<Vec<String>>>;

    /// Enabled profiles whose configured delivery time equals `hhmm`.
    async fn due_profiles(&self, hhmm: &str) -> Result<Vec<UserProfile>>;

    async fn mark_sent(&self, user: UserId, date: NaiveDate) -> Result<()>;
}

#[derive(Default)]
struct MemoryInner {
    words: Vec<WordEntry>,
    profiles: HashMap<i64, UserProfile>,
    next_id: i64,
}

/// In-memory `WordStore`. Deterministic apart from `random_words` ordering.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn word_count(&self) -> usize {
        self.inner.lock().await.words.len()
    }
}

#[async_trait]
impl WordStore for MemoryStore {
    async fn ensure_user(&self, user: UserId, username: Option<&str>) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let profile = inner
            .profiles
            .entry(user.0)
            .or_insert_with(|| UserProfile::new(user));
        if let Some(name) = username {
            profile.username = Some(name.to_string());
        }
        Ok(())
    }

    async fn insert_words(&self, entries: &[NewWordEntry]) -> Result<usize> {
        let mut inner = self.inner.lock().await;
        let mut count = 0usize;
        for e in entries {
            if e.definition.trim().is_empty() {
                continue;
            }
            inner.next_id += 1;
            let id = inner.next_id;
            inner.words.push(WordEntry {
                id,
                topic: e.topic.clone(),
                word: e.word.clone(),
                definition: e.definition.clone(),
                example: e.example.clone(),
                pronunciation: e.pronunciation.clone(),
                level: e.level,
                source: e.source.clone(),
            });
            count += 1;
        }
        Ok(count)
    }

    async fn random_words(&self, filter: &WordFilter, count: u32) -> Result<Vec<WordEntry>> {
        let inner = self.inner.lock().await;
        let mut matching: Vec<WordEntry> = inner
            .words
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        matching.shuffle(&mut rand::thread_rng());
        matching.truncate(count as usize);
        Ok(matching)
    }

    async fn list_words(&self, limit: u32) -> Result<Vec<WordEntry>> {
        let inner = self.inner.lock().await;
        let mut out = inner.words.clone();
        out.sort_by(|a, b| (&a.topic, a.level.as_str()).cmp(&(&b.topic, b.level.as_str())));
        out.truncate(limit as usize);
        Ok(out)
    }

    async fn search_words(&self, field: SearchField, query: &str) -> Result<Vec<WordEntry>> {
        let needle = query.to_lowercase();
        let inner = self.inner.lock().await;
        Ok(inner
            .words
            .iter()
            .filter(|e| {
                let hay = match field {
                    SearchField::Word => &e.word,
                    SearchField::Topic => &e.topic,
                    SearchField::Level => return e.level.as_str().to_lowercase().contains(&needle),
                };
                hay.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }

    async fn clear_words(&self) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        let n = inner.words.len() as u64;
        inner.words.clear();
        Ok(n)
    }

    async fn profile(&self, user: UserId) -> Result<Option<UserProfile>> {
        Ok(self.inner.lock().await.profiles.get(&user.0).cloned())
    }

    async fn upsert_daily(&self, user: UserId, settings: &DailySettings) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let profile = inner
            .profiles
            .entry(user.0)
            .or_insert_with(|| UserProfile::new(user));
        profile.daily_enabled = true;
        profile.daily_count = settings.count;
        profile.daily_time = Some(settings.time.clone());
        profile.daily_level = settings.level;
        profile.daily_pos = settings.pos.clone();
        Ok(())
    }

    async fn set_source_prefs(&self, user: UserId, prefs: &[String]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let profile = inner
            .profiles
            .entry(user.0)
            .or_insert_with(|| UserProfile::new(user));
        profile.source_prefs = Some(prefs.to_vec());
        Ok(())
    }

    async fn source_prefs(&self, user: UserId) -> Result<Option<Vec<String>>> {
        Ok(self
            .inner
            .lock()
            .await
            .profiles
            .get(&user.0)
            .and_then(|p| p.source_prefs.clone()))
    }

    async fn due_profiles(&self, hhmm: &str) -> Result<Vec<UserProfile>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .profiles
            .values()
            .filter(|p| p.daily_enabled && p.daily_time.as_deref() == Some(hhmm))
            .cloned()
            .collect())
    }

    async fn mark_sent(&self, user: UserId, date: NaiveDate) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(profile) = inner.profiles.get_mut(&user.0) {
            profile.last_sent_date = Some(date);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(word: &str, definition: &str, level: Level) -> NewWordEntry {
        NewWordEntry {
            topic: "General".to_string(),
            word: word.to_string(),
            definition: definition.to_string(),
            level,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn insert_drops_entries_without_definition() {
        let store = MemoryStore::new();
        let n = store
            .insert_words(&[
                word("run (Verb)", "to move fast", Level::A1),
                word("ghost", "", Level::B1),
                word("ghost", "   ", Level::B1),
            ])
            .await
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(store.word_count().await, 1);
    }

    #[tokio::test]
    async fn random_words_honor_level_and_pos_filters() {
        let store = MemoryStore::new();
        store
            .insert_words(&[
                word("run (Verb)", "to move fast", Level::A1),
                word("run (Noun)", "a jog", Level::B2),
                word("walk (Verb)", "to go on foot", Level::A1),
            ])
            .await
            .unwrap();

        let picked = store
            .random_words(
                &WordFilter {
                    level: Some(Level::A1),
                    pos: Some("verb".to_string()),
                },
                10,
            )
            .await
            .unwrap();
        assert_eq!(picked.len(), 2);
        assert!(picked.iter().all(|e| e.level == Level::A1));

        let none = store
            .random_words(
                &WordFilter {
                    level: Some(Level::C2),
                    pos: None,
                },
                10,
            )
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn due_profiles_match_exact_time_only() {
        let store = MemoryStore::new();
        store.ensure_user(UserId(1), Some("a")).await.unwrap();
        store.ensure_user(UserId(2), None).await.unwrap();
        store
            .upsert_daily(
                UserId(1),
                &DailySettings {
                    count: 3,
                    time: "09:30".to_string(),
                    level: None,
                    pos: None,
                },
            )
            .await
            .unwrap();

        let due = store.due_profiles("09:30").await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].user_id, UserId(1));
        assert!(store.due_profiles("09:31").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_preserves_source_prefs() {
        let store = MemoryStore::new();
        store
            .set_source_prefs(UserId(7), &["Merriam-Webster".to_string()])
            .await
            .unwrap();
        store
            .upsert_daily(
                UserId(7),
                &DailySettings {
                    count: 1,
                    time: "08:00".to_string(),
                    level: Some(Level::B1),
                    pos: None,
                },
            )
            .await
            .unwrap();

        let profile = store.profile(UserId(7)).await.unwrap().unwrap();
        assert!(profile.daily_enabled);
        assert_eq!(
            profile.source_prefs,
            Some(vec!["Merriam-Webster".to_string()])
        );
    }
}
