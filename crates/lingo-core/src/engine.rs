//! Multi-turn conversation engine.
//!
//! Each user has at most one active flow, kept as a tagged state that carries
//! every field collected so far. Nothing is written to the store until a flow
//! reaches its terminal step, so cancelling (or going idle) anywhere in the
//! middle leaves no partial rows behind.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use regex::Regex;
use tokio::sync::Mutex;

use crate::{
    domain::{
        display_title, DailySettings, Level, NewWordEntry, UserId, WordEntry, DEFAULT_TOPIC,
        SOURCE_MANUAL,
    },
    enrich::EnrichmentPipeline,
    formatting::{search_results, word_card, word_list},
    keyboards,
    messaging::ReplyKeyboard,
    store::{SearchField, WordFilter, WordStore},
    Result,
};

const MAX_DAILY_COUNT: u32 = 50;
const LIST_LIMIT: u32 = 50;
const SEARCH_CAP: usize = 40;

static HHMM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").expect("static regex"));

/// Strict 24-hour "HH:MM" with zero padding. "9:3" and "25:00" fail.
pub fn is_valid_hhmm(s: &str) -> bool {
    HHMM_RE.is_match(s)
}

/// Side effect the transport layer must perform alongside the reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineAction {
    /// Send the database file to the requesting admin as a document.
    SendBackup,
}

/// What the engine wants sent back for one inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: ReplyKeyboard,
    pub action: Option<EngineAction>,
}

impl Reply {
    fn new(text: impl Into<String>, keyboard: ReplyKeyboard) -> Self {
        Self {
            text: text.into(),
            keyboard,
            action: None,
        }
    }

    fn menu(text: impl Into<String>, is_admin: bool) -> Self {
        Self::new(text, keyboards::main_menu(is_admin))
    }
}

/// Steps of the manual add flow, each carrying what earlier steps collected.
#[derive(Clone, Debug)]
enum ManualStep {
    Topic,
    Level {
        topic: String,
    },
    Word {
        topic: String,
        level: Option<Level>,
    },
    Definition {
        topic: String,
        level: Option<Level>,
        word: String,
    },
    Example {
        topic: String,
        level: Option<Level>,
        word: String,
        definition: String,
    },
    Pronunciation {
        topic: String,
        level: Option<Level>,
        word: String,
        definition: String,
        example: Option<String>,
    },
}

/// Steps of the daily delivery settings flow.
#[derive(Clone, Debug)]
enum DailyStep {
    Count,
    Time {
        count: u32,
    },
    Level {
        count: u32,
        time: String,
    },
    Pos {
        count: u32,
        time: String,
        level: Option<Level>,
    },
}

#[derive(Clone, Debug)]
enum Flow {
    AddChoice,
    Manual(ManualStep),
    AiWord,
    BulkChoice,
    BulkManual,
    BulkAi,
    SearchChoice,
    SearchQuery(SearchField),
    Daily(DailyStep),
    SettingsChoice,
    SourcePriority,
}

struct Session {
    flow: Flow,
    last_activity: Instant,
}

/// Drives every flow; one instance shared across chats.
pub struct ConversationEngine {
    store: Arc<dyn WordStore>,
    pipeline: Arc<EnrichmentPipeline>,
    admin_ids: Vec<i64>,
    idle_timeout: Duration,
    sessions: Mutex<HashMap<UserId, Session>>,
}

impl ConversationEngine {
    pub fn new(
        store: Arc<dyn WordStore>,
        pipeline: Arc<EnrichmentPipeline>,
        admin_ids: Vec<i64>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            store,
            pipeline,
            admin_ids,
            idle_timeout,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_admin(&self, user: UserId) -> bool {
        self.admin_ids.contains(&user.0)
    }

    /// Feed one inbound text message through the user's flow (or the menu).
    pub async fn advance(
        &self,
        user: UserId,
        username: Option<&str>,
        text: &str,
    ) -> Result<Reply> {
        self.store.ensure_user(user, username).await?;
        let text = text.trim();
        let is_admin = self.is_admin(user);

        if text == keyboards::CANCEL || text == "/cancel" {
            self.sessions.lock().await.remove(&user);
            return Ok(Reply::menu("Cancelled. Back to the menu.", is_admin));
        }

        // Take the flow out while holding the lock, never across awaits.
        // Idle sessions are evicted here rather than by a background task.
        let flow = {
            let mut sessions = self.sessions.lock().await;
            match sessions.remove(&user) {
                Some(s) if s.last_activity.elapsed() < self.idle_timeout => Some(s.flow),
                _ => None,
            }
        };

        let (next, reply) = match flow {
            None => self.handle_menu(is_admin, text).await?,
            Some(flow) => self.handle_flow(user, is_admin, flow, text).await?,
        };

        if let Some(flow) = next {
            self.sessions.lock().await.insert(
                user,
                Session {
                    flow,
                    last_activity: Instant::now(),
                },
            );
        }
        Ok(reply)
    }

    async fn handle_menu(&self, is_admin: bool, text: &str) -> Result<(Option<Flow>, Reply)> {
        let reply = match text {
            "/start" => Reply::menu(
                "👋 Welcome to Lingo! Pick an option below.",
                is_admin,
            ),
            keyboards::MENU_GET_WORD => {
                let picked = self
                    .store
                    .random_words(&WordFilter::default(), 1)
                    .await?;
                match picked.first() {
                    Some(entry) => Reply::menu(word_card(entry), is_admin),
                    None => Reply::menu("Database empty. Add some words first!", is_admin),
                }
            }
            keyboards::MENU_ADD_WORD => {
                return Ok((
                    Some(Flow::AddChoice),
                    Reply::new("How do you want to add a word?", keyboards::add_choice()),
                ));
            }
            keyboards::MENU_LIST_WORDS => {
                let entries = self.store.list_words(LIST_LIMIT).await?;
                Reply::menu(word_list(&entries), is_admin)
            }
            keyboards::MENU_DAILY_WORDS => {
                return Ok((
                    Some(Flow::Daily(DailyStep::Count)),
                    Reply::new(
                        format!("How many words per day? (1-{MAX_DAILY_COUNT})"),
                        keyboards::cancel_only(),
                    ),
                ));
            }
            keyboards::MENU_SEARCH => {
                return Ok((
                    Some(Flow::SearchChoice),
                    Reply::new("Search by what?", keyboards::search_menu()),
                ));
            }
            keyboards::MENU_SETTINGS => {
                return Ok((
                    Some(Flow::SettingsChoice),
                    Reply::new("Settings:", keyboards::settings_menu()),
                ));
            }
            keyboards::MENU_BULK_ADD if is_admin => {
                return Ok((
                    Some(Flow::BulkChoice),
                    Reply::new("Bulk add: Manual lines or AI?", keyboards::add_choice()),
                ));
            }
            keyboards::MENU_CLEAR_WORDS if is_admin => {
                let deleted = self.store.clear_words().await?;
                Reply::menu(format!("🗑 Deleted {deleted} words."), is_admin)
            }
            keyboards::MENU_BACKUP if is_admin => {
                let mut reply = Reply::menu("🛡 Sending backup...", is_admin);
                reply.action = Some(EngineAction::SendBackup);
                reply
            }
            _ => Reply::menu("Choose an option:", is_admin),
        };
        Ok((None, reply))
    }

    async fn handle_flow(
        &self,
        user: UserId,
        is_admin: bool,
        flow: Flow,
        text: &str,
    ) -> Result<(Option<Flow>, Reply)> {
        match flow {
            Flow::AddChoice => match text {
                keyboards::ADD_MANUAL => Ok((
                    Some(Flow::Manual(ManualStep::Topic)),
                    Reply::new(
                        format!("Topic? (Skip for \"{DEFAULT_TOPIC}\")"),
                        keyboards::skip_cancel(),
                    ),
                )),
                keyboards::ADD_AI => Ok((
                    Some(Flow::AiWord),
                    Reply::new("Which word should I look up?", keyboards::cancel_only()),
                )),
                // Anything off-menu abandons the flow.
                _ => Ok((None, Reply::menu("Back to the menu.", is_admin))),
            },
            Flow::Manual(step) => self.handle_manual(is_admin, step, text).await,
            Flow::AiWord => self.handle_ai_word(user, is_admin, text).await,
            Flow::BulkChoice => match text {
                keyboards::ADD_MANUAL => Ok((
                    Some(Flow::BulkManual),
                    Reply::new(
                        "Send one entry per line:\nword | definition | example (example optional)",
                        keyboards::cancel_only(),
                    ),
                )),
                keyboards::ADD_AI => Ok((
                    Some(Flow::BulkAi),
                    Reply::new(
                        "Send words to look up, separated by commas or whitespace.",
                        keyboards::cancel_only(),
                    ),
                )),
                _ => Ok((None, Reply::menu("Back to the menu.", is_admin))),
            },
            Flow::BulkManual => self.handle_bulk_manual(is_admin, text).await,
            Flow::BulkAi => self.handle_bulk_ai(user, is_admin, text).await,
            Flow::SearchChoice => match text {
                keyboards::SEARCH_BY_WORD => Ok((
                    Some(Flow::SearchQuery(SearchField::Word)),
                    Reply::new("Which word?", keyboards::cancel_only()),
                )),
                keyboards::SEARCH_BY_LEVEL => Ok((
                    Some(Flow::SearchQuery(SearchField::Level)),
                    Reply::new("Which level? (A1-C2)", keyboards::level_search_menu()),
                )),
                keyboards::SEARCH_BY_TOPIC => Ok((
                    Some(Flow::SearchQuery(SearchField::Topic)),
                    Reply::new("Which topic?", keyboards::cancel_only()),
                )),
                _ => Ok((None, Reply::menu("Back to the menu.", is_admin))),
            },
            Flow::SearchQuery(field) => {
                let hits = self.store.search_words(field, text).await?;
                Ok((
                    None,
                    Reply::menu(search_results(&hits, SEARCH_CAP), is_admin),
                ))
            }
            Flow::Daily(step) => self.handle_daily(user, is_admin, step, text).await,
            Flow::SettingsChoice => match text {
                keyboards::SETTINGS_PRIORITY => Ok((
                    Some(Flow::SourcePriority),
                    Reply::new(
                        "Which dictionary should be tried first?",
                        keyboards::priority_menu(),
                    ),
                )),
                _ => Ok((None, Reply::menu("Back to the menu.", is_admin))),
            },
            Flow::SourcePriority => {
                let ordered = |reversed: bool| {
                    let mut names: Vec<String> = crate::config::DEFAULT_SOURCES
                        .iter()
                        .map(|s| s.to_string())
                        .collect();
                    if reversed {
                        names.reverse();
                    }
                    names
                };
                let prefs: Option<Vec<String>> = match text {
                    keyboards::PRIORITY_CAMBRIDGE => Some(ordered(false)),
                    keyboards::PRIORITY_WEBSTER => Some(ordered(true)),
                    _ => None,
                };
                match prefs {
                    Some(prefs) => {
                        self.store.set_source_prefs(user, &prefs).await?;
                        Ok((
                            None,
                            Reply::menu(
                                format!("Source priority set: {}.", prefs.join(" → ")),
                                is_admin,
                            ),
                        ))
                    }
                    None => Ok((None, Reply::menu("Back to the menu.", is_admin))),
                }
            }
        }
    }

    async fn handle_manual(
        &self,
        is_admin: bool,
        step: ManualStep,
        text: &str,
    ) -> Result<(Option<Flow>, Reply)> {
        match step {
            ManualStep::Topic => {
                let topic = if text == keyboards::SKIP {
                    DEFAULT_TOPIC.to_string()
                } else {
                    text.to_string()
                };
                Ok((
                    Some(Flow::Manual(ManualStep::Level { topic })),
                    Reply::new("Level?", keyboards::level_menu()),
                ))
            }
            ManualStep::Level { topic } => match parse_level_or_skip(text) {
                Some(level) => Ok((
                    Some(Flow::Manual(ManualStep::Word { topic, level })),
                    Reply::new("Which word?", keyboards::cancel_only()),
                )),
                None => Ok((
                    Some(Flow::Manual(ManualStep::Level { topic })),
                    Reply::new("Pick a level (A1-C2) or Skip.", keyboards::level_menu()),
                )),
            },
            // Free-text steps take the input verbatim, empty included; the
            // store drops definition-less rows at persistence.
            ManualStep::Word { topic, level } => Ok((
                Some(Flow::Manual(ManualStep::Definition {
                    topic,
                    level,
                    word: text.to_string(),
                })),
                Reply::new("Definition?", keyboards::cancel_only()),
            )),
            ManualStep::Definition { topic, level, word } => Ok((
                Some(Flow::Manual(ManualStep::Example {
                    topic,
                    level,
                    word,
                    definition: text.to_string(),
                })),
                Reply::new("Example sentence? (or Skip)", keyboards::skip_cancel()),
            )),
            ManualStep::Example {
                topic,
                level,
                word,
                definition,
            } => {
                let example = skip_to_none(text);
                Ok((
                    Some(Flow::Manual(ManualStep::Pronunciation {
                        topic,
                        level,
                        word,
                        definition,
                        example,
                    })),
                    Reply::new("Pronunciation? (or Skip)", keyboards::skip_cancel()),
                ))
            }
            ManualStep::Pronunciation {
                topic,
                level,
                word,
                definition,
                example,
            } => {
                // Terminal step: the single point where manual adds hit the
                // store.
                let entry = NewWordEntry {
                    topic,
                    word: display_title(&word, None),
                    definition,
                    example: example.unwrap_or_default(),
                    pronunciation: skip_to_none(text).unwrap_or_default(),
                    level: level.unwrap_or(Level::Unknown),
                    source: SOURCE_MANUAL.to_string(),
                };
                let title = entry.word.clone();
                let saved = self.store.insert_words(&[entry]).await?;
                let text = if saved == 0 {
                    "Nothing saved: the definition was empty.".to_string()
                } else {
                    format!("✅ Saved \"{title}\".")
                };
                Ok((None, Reply::menu(text, is_admin)))
            }
        }
    }

    async fn handle_ai_word(
        &self,
        user: UserId,
        is_admin: bool,
        text: &str,
    ) -> Result<(Option<Flow>, Reply)> {
        if text.is_empty() {
            return Ok((
                Some(Flow::AiWord),
                Reply::new("Send the word itself.", keyboards::cancel_only()),
            ));
        }

        let candidates = self.pipeline.enrich(text, user).await?;
        if candidates.is_empty() {
            return Ok((
                None,
                Reply::menu(
                    format!("Couldn't find or generate anything for \"{text}\"."),
                    is_admin,
                ),
            ));
        }

        let entries: Vec<NewWordEntry> = candidates
            .iter()
            .cloned()
            .map(|c| c.into_entry(DEFAULT_TOPIC))
            .collect();
        let saved = self.pipeline.persist(candidates, DEFAULT_TOPIC).await?;

        let cards = entries
            .iter()
            .filter(|e| !e.definition.trim().is_empty())
            .map(preview_card)
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok((
            None,
            Reply::menu(format!("✅ Saved {saved} entries.\n\n{cards}"), is_admin),
        ))
    }

    async fn handle_bulk_manual(
        &self,
        is_admin: bool,
        text: &str,
    ) -> Result<(Option<Flow>, Reply)> {
        let mut entries = Vec::new();
        let mut skipped = 0usize;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.splitn(3, '|').map(str::trim);
            let word = parts.next().unwrap_or_default();
            let definition = parts.next().unwrap_or_default();
            let example = parts.next().unwrap_or_default();
            if word.is_empty() || definition.is_empty() {
                skipped += 1;
                continue;
            }
            entries.push(NewWordEntry {
                topic: DEFAULT_TOPIC.to_string(),
                word: display_title(word, None),
                definition: definition.to_string(),
                example: example.to_string(),
                pronunciation: String::new(),
                level: Level::Unknown,
                source: SOURCE_MANUAL.to_string(),
            });
        }
        let saved = self.store.insert_words(&entries).await?;
        Ok((
            None,
            Reply::menu(
                format!("📦 Imported {saved} entries ({skipped} lines skipped)."),
                is_admin,
            ),
        ))
    }

    async fn handle_bulk_ai(
        &self,
        user: UserId,
        is_admin: bool,
        text: &str,
    ) -> Result<(Option<Flow>, Reply)> {
        let mut saved = 0usize;
        let mut words = 0usize;
        for word in text.split(|c: char| c == ',' || c.is_whitespace()) {
            let word = word.trim();
            if word.is_empty() {
                continue;
            }
            words += 1;
            let candidates = self.pipeline.enrich(word, user).await?;
            saved += self.pipeline.persist(candidates, DEFAULT_TOPIC).await?;
        }
        Ok((
            None,
            Reply::menu(
                format!("📦 Imported {saved} entries for {words} words."),
                is_admin,
            ),
        ))
    }

    async fn handle_daily(
        &self,
        user: UserId,
        is_admin: bool,
        step: DailyStep,
        text: &str,
    ) -> Result<(Option<Flow>, Reply)> {
        match step {
            DailyStep::Count => match text.parse::<u32>() {
                Ok(count) if (1..=MAX_DAILY_COUNT).contains(&count) => Ok((
                    Some(Flow::Daily(DailyStep::Time { count })),
                    Reply::new(
                        "What time? (24h HH:MM, e.g. 09:30)",
                        keyboards::cancel_only(),
                    ),
                )),
                _ => Ok((
                    Some(Flow::Daily(DailyStep::Count)),
                    Reply::new(
                        format!("Send a number from 1 to {MAX_DAILY_COUNT}."),
                        keyboards::cancel_only(),
                    ),
                )),
            },
            DailyStep::Time { count } => {
                if !is_valid_hhmm(text) {
                    return Ok((
                        Some(Flow::Daily(DailyStep::Time { count })),
                        Reply::new(
                            "That's not a valid time. Use 24h HH:MM, e.g. 09:30.",
                            keyboards::cancel_only(),
                        ),
                    ));
                }
                Ok((
                    Some(Flow::Daily(DailyStep::Level {
                        count,
                        time: text.to_string(),
                    })),
                    Reply::new("Level filter? (or Skip for any)", keyboards::level_menu()),
                ))
            }
            DailyStep::Level { count, time } => match parse_level_or_skip(text) {
                Some(level) => Ok((
                    Some(Flow::Daily(DailyStep::Pos { count, time, level })),
                    Reply::new(
                        "Part-of-speech filter? (or Skip for any)",
                        keyboards::pos_menu(),
                    ),
                )),
                None => Ok((
                    Some(Flow::Daily(DailyStep::Level { count, time })),
                    Reply::new("Pick a level (A1-C2) or Skip.", keyboards::level_menu()),
                )),
            },
            DailyStep::Pos { count, time, level } => {
                let pos = skip_to_none(text).map(|p| p.to_lowercase());
                let settings = DailySettings {
                    count,
                    time: time.clone(),
                    level,
                    pos,
                };
                // Terminal step: one atomic profile write.
                self.store.upsert_daily(user, &settings).await?;
                Ok((
                    None,
                    Reply::menu(
                        format!("⏰ Daily words enabled: {count} per day at {time}."),
                        is_admin,
                    ),
                ))
            }
        }
    }
}

/// `Skip` and `A1`..`C2` are accepted; anything else asks again.
fn parse_level_or_skip(text: &str) -> Option<Option<Level>> {
    if text == keyboards::SKIP {
        return Some(None);
    }
    match Level::parse(text) {
        Level::Unknown => None,
        level => Some(Some(level)),
    }
}

fn skip_to_none(text: &str) -> Option<String> {
    if text == keyboards::SKIP || text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn preview_card(entry: &NewWordEntry) -> String {
    word_card(&WordEntry {
        id: 0,
        topic: entry.topic.clone(),
        word: entry.word.clone(),
        definition: entry.definition.clone(),
        example: entry.example.clone(),
        pronunciation: entry.pronunciation.clone(),
        level: entry.level,
        source: entry.source.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{Candidate, CandidateField, DictionaryProvider, GenerationService};
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    struct NoGeneration;

    #[async_trait]
    impl GenerationService for NoGeneration {
        async fn generate(&self, _word: &str) -> Result<String> {
            Err(crate::Error::External("generation disabled".to_string()))
        }

        async fn fill_missing(
            &self,
            _candidate: &Candidate,
            _missing: &[CandidateField],
        ) -> Result<String> {
            Err(crate::Error::External("generation disabled".to_string()))
        }
    }

    struct CannedProvider(Vec<Candidate>);

    #[async_trait]
    impl DictionaryProvider for CannedProvider {
        fn name(&self) -> &str {
            "Cambridge"
        }

        async fn lookup(&self, _word: &str) -> Result<Vec<Candidate>> {
            Ok(self.0.clone())
        }
    }

    fn engine_with(
        store: Arc<MemoryStore>,
        providers: Vec<Arc<dyn DictionaryProvider>>,
        idle_timeout: Duration,
    ) -> ConversationEngine {
        let pipeline = Arc::new(EnrichmentPipeline::new(
            store.clone(),
            providers,
            Arc::new(NoGeneration),
        ));
        ConversationEngine::new(store, pipeline, vec![42], idle_timeout)
    }

    fn engine(store: Arc<MemoryStore>) -> ConversationEngine {
        engine_with(store, Vec::new(), Duration::from_secs(900))
    }

    async fn say(engine: &ConversationEngine, user: i64, text: &str) -> Reply {
        engine
            .advance(UserId(user), Some("tester"), text)
            .await
            .unwrap()
    }

    #[test]
    fn hhmm_validation_is_strict() {
        assert!(is_valid_hhmm("09:30"));
        assert!(is_valid_hhmm("00:00"));
        assert!(is_valid_hhmm("23:59"));
        assert!(!is_valid_hhmm("25:00"));
        assert!(!is_valid_hhmm("9:3"));
        assert!(!is_valid_hhmm("09:60"));
        assert!(!is_valid_hhmm("0930"));
    }

    #[tokio::test]
    async fn full_manual_flow_inserts_exactly_one_row() {
        let store = Arc::new(MemoryStore::new());
        let e = engine(store.clone());

        say(&e, 1, keyboards::MENU_ADD_WORD).await;
        say(&e, 1, keyboards::ADD_MANUAL).await;
        say(&e, 1, "Food").await;
        say(&e, 1, "A1").await;
        say(&e, 1, "drink").await;
        say(&e, 1, "a liquid for swallowing").await;
        say(&e, 1, keyboards::SKIP).await;
        let last = say(&e, 1, keyboards::SKIP).await;

        assert!(last.text.contains("Saved"));
        assert_eq!(store.word_count().await, 1);
        let rows = store.list_words(10).await.unwrap();
        assert_eq!(rows[0].word, "drink");
        assert_eq!(rows[0].topic, "Food");
        assert_eq!(rows[0].level, Level::A1);
        assert!(rows[0].example.is_empty());
        assert_eq!(rows[0].source, "Manual");
    }

    #[tokio::test]
    async fn manual_flow_accepts_blank_free_text_fields() {
        let store = Arc::new(MemoryStore::new());
        let e = engine(store.clone());

        say(&e, 1, keyboards::MENU_ADD_WORD).await;
        say(&e, 1, keyboards::ADD_MANUAL).await;
        say(&e, 1, "Food").await;
        say(&e, 1, "A1").await;

        // A whitespace-only word advances to the definition step.
        let r = say(&e, 1, "   ").await;
        assert!(r.text.contains("Definition"));

        // A blank definition advances too; the row is dropped at persistence.
        let r = say(&e, 1, "  ").await;
        assert!(r.text.contains("Example"));
        say(&e, 1, keyboards::SKIP).await;
        let last = say(&e, 1, keyboards::SKIP).await;

        assert!(last.text.contains("Nothing saved"));
        assert_eq!(store.word_count().await, 0);
    }

    #[tokio::test]
    async fn cancel_mid_flow_leaves_zero_rows() {
        let store = Arc::new(MemoryStore::new());
        let e = engine(store.clone());

        say(&e, 1, keyboards::MENU_ADD_WORD).await;
        say(&e, 1, keyboards::ADD_MANUAL).await;
        say(&e, 1, "Food").await;
        say(&e, 1, "A1").await;
        say(&e, 1, "drink").await;
        let cancelled = say(&e, 1, keyboards::CANCEL).await;

        assert!(cancelled.text.contains("Cancelled"));
        assert_eq!(store.word_count().await, 0);
        // The session is gone: the next message routes through the menu.
        let next = say(&e, 1, "whatever").await;
        assert!(next.text.contains("Choose an option"));
    }

    #[tokio::test]
    async fn daily_flow_validates_count_and_time() {
        let store = Arc::new(MemoryStore::new());
        let e = engine(store.clone());

        say(&e, 1, keyboards::MENU_DAILY_WORDS).await;
        let r = say(&e, 1, "0").await;
        assert!(r.text.contains("1 to 50"));
        let r = say(&e, 1, "51").await;
        assert!(r.text.contains("1 to 50"));
        say(&e, 1, "3").await;

        let r = say(&e, 1, "25:00").await;
        assert!(r.text.contains("HH:MM"));
        let r = say(&e, 1, "9:3").await;
        assert!(r.text.contains("HH:MM"));
        let r = say(&e, 1, "09:30").await;
        assert!(r.text.contains("Level"));

        say(&e, 1, "B1").await;
        let done = say(&e, 1, "noun").await;
        assert!(done.text.contains("3 per day at 09:30"));

        let profile = store.profile(UserId(1)).await.unwrap().unwrap();
        assert!(profile.daily_enabled);
        assert_eq!(profile.daily_count, 3);
        assert_eq!(profile.daily_time.as_deref(), Some("09:30"));
        assert_eq!(profile.daily_level, Some(Level::B1));
        assert_eq!(profile.daily_pos.as_deref(), Some("noun"));
    }

    #[tokio::test]
    async fn daily_skip_leaves_filters_unset() {
        let store = Arc::new(MemoryStore::new());
        let e = engine(store.clone());

        say(&e, 1, keyboards::MENU_DAILY_WORDS).await;
        say(&e, 1, "5").await;
        say(&e, 1, "18:00").await;
        say(&e, 1, keyboards::SKIP).await;
        say(&e, 1, keyboards::SKIP).await;

        let profile = store.profile(UserId(1)).await.unwrap().unwrap();
        assert_eq!(profile.daily_level, None);
        assert_eq!(profile.daily_pos, None);
    }

    #[tokio::test]
    async fn admin_buttons_are_ignored_for_plain_users() {
        let store = Arc::new(MemoryStore::new());
        let e = engine(store.clone());

        let r = say(&e, 1, keyboards::MENU_BULK_ADD).await;
        assert!(r.text.contains("Choose an option"));
        // No bulk flow was started.
        let r = say(&e, 1, keyboards::ADD_MANUAL).await;
        assert!(r.text.contains("Choose an option"));
    }

    #[tokio::test]
    async fn admin_bulk_manual_imports_and_skips_bad_lines() {
        let store = Arc::new(MemoryStore::new());
        let e = engine(store.clone());

        say(&e, 42, keyboards::MENU_BULK_ADD).await;
        say(&e, 42, keyboards::ADD_MANUAL).await;
        let r = say(
            &e,
            42,
            "run | to move fast | she runs daily\nbroken line\nwalk | to go on foot",
        )
        .await;

        assert!(r.text.contains("Imported 2 entries (1 lines skipped)"));
        assert_eq!(store.word_count().await, 2);
    }

    #[tokio::test]
    async fn admin_clear_words_reports_deleted_count() {
        let store = Arc::new(MemoryStore::new());
        let e = engine(store.clone());

        say(&e, 42, keyboards::MENU_BULK_ADD).await;
        say(&e, 42, keyboards::ADD_MANUAL).await;
        say(&e, 42, "run | to move fast").await;

        let r = say(&e, 42, keyboards::MENU_CLEAR_WORDS).await;
        assert!(r.text.contains("Deleted 1"));
        assert_eq!(store.word_count().await, 0);
    }

    #[tokio::test]
    async fn backup_button_requests_the_document_action() {
        let store = Arc::new(MemoryStore::new());
        let e = engine(store);
        let r = say(&e, 42, keyboards::MENU_BACKUP).await;
        assert_eq!(r.action, Some(EngineAction::SendBackup));

        let store = Arc::new(MemoryStore::new());
        let e = engine(store);
        let r = say(&e, 1, keyboards::MENU_BACKUP).await;
        assert_eq!(r.action, None);
    }

    #[tokio::test]
    async fn ai_add_saves_enriched_candidates() {
        let store = Arc::new(MemoryStore::new());
        let mut noun = Candidate::bare("drink", "Cambridge");
        noun.part_of_speech = Some("Noun".to_string());
        noun.definition = Some("a liquid".to_string());
        noun.example = Some("a cold drink".to_string());
        noun.pronunciation = Some("/drɪŋk/".to_string());
        noun.level = Some(Level::A1);
        let e = engine_with(
            store.clone(),
            vec![Arc::new(CannedProvider(vec![noun]))],
            Duration::from_secs(900),
        );

        say(&e, 1, keyboards::MENU_ADD_WORD).await;
        say(&e, 1, keyboards::ADD_AI).await;
        let r = say(&e, 1, "drink").await;

        assert!(r.text.contains("Saved 1 entries"));
        let rows = store.list_words(10).await.unwrap();
        assert_eq!(rows[0].word, "drink (Noun)");
    }

    #[tokio::test]
    async fn search_flow_returns_matches() {
        let store = Arc::new(MemoryStore::new());
        let e = engine(store.clone());

        say(&e, 42, keyboards::MENU_BULK_ADD).await;
        say(&e, 42, keyboards::ADD_MANUAL).await;
        say(&e, 42, "run | to move fast").await;

        say(&e, 1, keyboards::MENU_SEARCH).await;
        say(&e, 1, keyboards::SEARCH_BY_WORD).await;
        let r = say(&e, 1, "run").await;
        assert!(r.text.contains("run"));

        say(&e, 1, keyboards::MENU_SEARCH).await;
        say(&e, 1, keyboards::SEARCH_BY_WORD).await;
        let r = say(&e, 1, "zzz").await;
        assert!(r.text.contains("No results"));
    }

    #[tokio::test]
    async fn level_search_menu_has_no_skip_button() {
        let store = Arc::new(MemoryStore::new());
        let e = engine(store);

        say(&e, 1, keyboards::MENU_SEARCH).await;
        let r = say(&e, 1, keyboards::SEARCH_BY_LEVEL).await;
        assert!(!r
            .keyboard
            .rows
            .iter()
            .flatten()
            .any(|label| label == keyboards::SKIP));
        assert!(r.keyboard.rows.iter().flatten().any(|label| label == "B1"));
    }

    #[tokio::test]
    async fn source_priority_flow_saves_prefs() {
        let store = Arc::new(MemoryStore::new());
        let e = engine(store.clone());

        say(&e, 1, keyboards::MENU_SETTINGS).await;
        say(&e, 1, keyboards::SETTINGS_PRIORITY).await;
        let r = say(&e, 1, keyboards::PRIORITY_WEBSTER).await;
        assert!(r.text.contains("priority set"));

        let prefs = store.source_prefs(UserId(1)).await.unwrap().unwrap();
        assert_eq!(prefs[0], "Merriam-Webster");
    }

    #[tokio::test]
    async fn off_menu_input_abandons_choice_states() {
        let store = Arc::new(MemoryStore::new());
        let e = engine(store);

        say(&e, 1, keyboards::MENU_ADD_WORD).await;
        let r = say(&e, 1, "gibberish").await;
        assert!(r.text.contains("Back to the menu"));
        // The choice flow is gone, so a former choice label means nothing.
        let r = say(&e, 1, keyboards::ADD_MANUAL).await;
        assert!(r.text.contains("Choose an option"));
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted() {
        let store = Arc::new(MemoryStore::new());
        let e = engine_with(store, Vec::new(), Duration::ZERO);

        say(&e, 1, keyboards::MENU_ADD_WORD).await;
        // The flow expired immediately, so this routes through the menu.
        let r = say(&e, 1, keyboards::ADD_MANUAL).await;
        assert!(r.text.contains("Choose an option"));
    }
}
