//! Ports for the external dictionary providers and the generation service.

use async_trait::async_trait;

use crate::{
    domain::{display_title, Level, NewWordEntry, DEFAULT_TOPIC},
    Result,
};

/// An unpersisted, possibly-partial word record produced by a provider or the
/// generation service.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Candidate {
    pub word: String,
    pub part_of_speech: Option<String>,
    pub level: Option<Level>,
    pub definition: Option<String>,
    pub example: Option<String>,
    pub pronunciation: Option<String>,
    pub source: String,
}

/// Fillable candidate fields, used by the augmentation pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CandidateField {
    PartOfSpeech,
    Level,
    Definition,
    Example,
    Pronunciation,
}

impl CandidateField {
    /// Label used when asking the generation service for the field.
    pub fn label(self) -> &'static str {
        match self {
            CandidateField::PartOfSpeech => "pos",
            CandidateField::Level => "level",
            CandidateField::Definition => "def",
            CandidateField::Example => "ex",
            CandidateField::Pronunciation => "pron",
        }
    }
}

impl Candidate {
    pub fn bare(word: &str, source: &str) -> Self {
        Self {
            word: word.trim().to_string(),
            source: source.to_string(),
            ..Default::default()
        }
    }

    pub fn missing_fields(&self) -> Vec<CandidateField> {
        let mut missing = Vec::new();
        if self.part_of_speech.is_none() {
            missing.push(CandidateField::PartOfSpeech);
        }
        if self.level.is_none() {
            missing.push(CandidateField::Level);
        }
        if self.definition.is_none() {
            missing.push(CandidateField::Definition);
        }
        if self.example.is_none() {
            missing.push(CandidateField::Example);
        }
        if self.pronunciation.is_none() {
            missing.push(CandidateField::Pronunciation);
        }
        missing
    }

    /// Convert to a storable entry, applying the title rule. The store still
    /// drops the row if the definition ended up empty.
    pub fn into_entry(self, topic: &str) -> NewWordEntry {
        let topic = if topic.trim().is_empty() {
            DEFAULT_TOPIC.to_string()
        } else {
            topic.trim().to_string()
        };
        NewWordEntry {
            topic,
            word: display_title(&self.word, self.part_of_speech.as_deref()),
            definition: self.definition.unwrap_or_default(),
            example: self.example.unwrap_or_default(),
            pronunciation: self.pronunciation.unwrap_or_default(),
            level: self.level.unwrap_or(Level::Unknown),
            source: self.source,
        }
    }
}

/// An external dictionary source queried by word.
///
/// Each adapter commits to its first successfully-parsed sense, so `lookup`
/// returns zero or one candidate in practice. Network and parse problems are
/// `Err`; an existing page with no usable definition is `Ok(vec![])` — the
/// pipeline treats both as "nothing here" but can log them apart.
#[async_trait]
pub trait DictionaryProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn lookup(&self, word: &str) -> Result<Vec<Candidate>>;
}

/// The hosted language model used to synthesize or complete word data.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Full analysis: one labelled block per part of speech (see
    /// `enrich::parse_generation_blocks` for the text contract).
    async fn generate(&self, word: &str) -> Result<String>;

    /// Targeted augmentation: `key: value` lines for just the missing fields,
    /// given the partially-filled candidate as context.
    async fn fill_missing(&self, candidate: &Candidate, missing: &[CandidateField])
        -> Result<String>;
}
