//! Source-priority enrichment pipeline.
//!
//! Providers are tried in the user's preferred order and the first one that
//! yields a result wins — results from different dictionaries are never
//! merged. Only a total miss falls through to full generation; a scrape hit
//! gets a cheaper per-field augmentation pass instead.

use std::sync::Arc;

use crate::{
    domain::{Level, UserId},
    providers::{Candidate, CandidateField, DictionaryProvider, GenerationService},
    store::WordStore,
    Result,
};

/// Alias table mapping generation-service key names to candidate fields.
/// Keys are matched as lowercase substrings, so "Definition" hits "def".
const FIELD_ALIASES: [(&str, CandidateField); 5] = [
    ("def", CandidateField::Definition),
    ("ex", CandidateField::Example),
    ("pron", CandidateField::Pronunciation),
    ("level", CandidateField::Level),
    ("pos", CandidateField::PartOfSpeech),
];

pub struct EnrichmentPipeline {
    store: Arc<dyn WordStore>,
    providers: Vec<Arc<dyn DictionaryProvider>>,
    generation: Arc<dyn GenerationService>,
}

impl EnrichmentPipeline {
    /// `providers` in registration order doubles as the fixed default
    /// priority for users without a saved preference.
    pub fn new(
        store: Arc<dyn WordStore>,
        providers: Vec<Arc<dyn DictionaryProvider>>,
        generation: Arc<dyn GenerationService>,
    ) -> Self {
        Self {
            store,
            providers,
            generation,
        }
    }

    /// Run the full pipeline for one word on behalf of one user.
    pub async fn enrich(&self, word: &str, user: UserId) -> Result<Vec<Candidate>> {
        let word = word.trim();
        if word.is_empty() {
            return Ok(Vec::new());
        }

        let mut candidates = self.scrape(word, user).await?;

        if candidates.is_empty() {
            // Total scrape miss: full generation, one candidate per sense.
            match self.generation.generate(word).await {
                Ok(text) => candidates = parse_generation_blocks(&text, word),
                Err(e) => {
                    eprintln!("[ENRICH] generation failed for {word}: {e}");
                }
            }
        } else {
            // Scrape hit: fill only the holes, never regenerate.
            for candidate in candidates.iter_mut() {
                self.augment(candidate).await;
            }
        }

        Ok(candidates)
    }

    /// Step 2: providers in the user's order; first non-empty result wins.
    async fn scrape(&self, word: &str, user: UserId) -> Result<Vec<Candidate>> {
        let prefs = self.store.source_prefs(user).await?;
        for provider in self.ordered_providers(prefs.as_deref()) {
            match provider.lookup(word).await {
                Ok(found) if !found.is_empty() => return Ok(found),
                Ok(_) => {}
                Err(e) => {
                    // Transient failure and "no data" degrade the same way,
                    // but are distinguishable here for the log.
                    eprintln!("[ENRICH] {} lookup failed for {word}: {e}", provider.name());
                }
            }
        }
        Ok(Vec::new())
    }

    /// Resolve preference names against the registry, skipping unrecognized
    /// entries; `None` means the registration order.
    fn ordered_providers(&self, prefs: Option<&[String]>) -> Vec<Arc<dyn DictionaryProvider>> {
        let Some(prefs) = prefs else {
            return self.providers.clone();
        };
        prefs
            .iter()
            .filter_map(|name| {
                self.providers
                    .iter()
                    .find(|p| p.name().eq_ignore_ascii_case(name))
                    .cloned()
            })
            .collect()
    }

    /// Step 4: ask the service for just the missing fields. A field already
    /// set is never overwritten; failures leave the candidate as-is.
    async fn augment(&self, candidate: &mut Candidate) {
        let missing = candidate.missing_fields();
        if missing.is_empty() {
            return;
        }

        match self.generation.fill_missing(candidate, &missing).await {
            Ok(text) => {
                for line in text.lines() {
                    apply_alias_line(candidate, line);
                }
            }
            Err(e) => {
                eprintln!(
                    "[ENRICH] augmentation failed for {}: {e} (keeping partial)",
                    candidate.word
                );
            }
        }
    }

    /// Persist candidates under `topic`; rows without a definition are
    /// silently dropped by the store.
    pub async fn persist(&self, candidates: Vec<Candidate>, topic: &str) -> Result<usize> {
        let entries: Vec<_> = candidates
            .into_iter()
            .map(|c| c.into_entry(topic))
            .collect();
        self.store.insert_words(&entries).await
    }
}

/// Parse the full-generation text contract: one block per sense with
/// `POS:`/`Level:`/`Def:`/`Ex:`/`Pron:` labels (case-sensitive), blocks
/// separated by blank, `---`, or `Item N` lines. A block is accepted only if
/// it carries a definition; unrecognized lines are ignored.
pub fn parse_generation_blocks(text: &str, word: &str) -> Vec<Candidate> {
    let mut out = Vec::new();
    let mut current: Option<Candidate> = None;

    let mut flush = |current: &mut Option<Candidate>| {
        if let Some(c) = current.take() {
            if c.definition.is_some() {
                out.push(c);
            }
        }
    };

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with("---") || line.starts_with("Item") {
            flush(&mut current);
            continue;
        }

        let candidate =
            current.get_or_insert_with(|| Candidate::bare(word, crate::domain::SOURCE_AI));

        if let Some(v) = line.strip_prefix("POS:") {
            candidate.part_of_speech = non_empty(v);
        } else if let Some(v) = line.strip_prefix("Level:") {
            candidate.level = non_empty(v).map(|s| Level::parse(&s));
        } else if let Some(v) = line.strip_prefix("Def:") {
            candidate.definition = non_empty(v);
        } else if let Some(v) = line.strip_prefix("Ex:") {
            candidate.example = non_empty(v);
        } else if let Some(v) = line.strip_prefix("Pron:") {
            candidate.pronunciation = non_empty(v);
        }
    }
    flush(&mut current);

    out
}

/// Map one `key: value` augmentation line onto the candidate via the alias
/// table, filling only fields that are still unset.
fn apply_alias_line(candidate: &mut Candidate, line: &str) {
    let Some((key, value)) = line.split_once(':') else {
        return;
    };
    let key = key.trim().to_lowercase();
    let Some(value) = non_empty(value) else {
        return;
    };

    for (alias, field) in FIELD_ALIASES {
        if !key.contains(alias) {
            continue;
        }
        match field {
            CandidateField::Definition if candidate.definition.is_none() => {
                candidate.definition = Some(value.clone());
            }
            CandidateField::Example if candidate.example.is_none() => {
                candidate.example = Some(value.clone());
            }
            CandidateField::Pronunciation if candidate.pronunciation.is_none() => {
                candidate.pronunciation = Some(value.clone());
            }
            CandidateField::Level if candidate.level.is_none() => {
                candidate.level = Some(Level::parse(&value));
            }
            CandidateField::PartOfSpeech if candidate.part_of_speech.is_none() => {
                candidate.part_of_speech = Some(value.clone());
            }
            _ => {}
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeProvider {
        name: &'static str,
        result: Result<Vec<Candidate>>,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        fn returning(name: &'static str, candidates: Vec<Candidate>) -> Arc<Self> {
            Arc::new(Self {
                name,
                result: Ok(candidates),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                result: Err(crate::Error::Provider("connect timeout".to_string())),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DictionaryProvider for FakeProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn lookup(&self, _word: &str) -> Result<Vec<Candidate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.result {
                Ok(v) => Ok(v.clone()),
                Err(_) => Err(crate::Error::Provider("connect timeout".to_string())),
            }
        }
    }

    #[derive(Default)]
    struct FakeGeneration {
        generate_text: Option<String>,
        fill_text: Option<String>,
        generate_calls: AtomicUsize,
        fill_calls: AtomicUsize,
    }

    #[async_trait]
    impl GenerationService for FakeGeneration {
        async fn generate(&self, _word: &str) -> Result<String> {
            self.generate_calls.fetch_add(1, Ordering::SeqCst);
            self.generate_text
                .clone()
                .ok_or_else(|| crate::Error::External("generation down".to_string()))
        }

        async fn fill_missing(
            &self,
            _candidate: &Candidate,
            _missing: &[CandidateField],
        ) -> Result<String> {
            self.fill_calls.fetch_add(1, Ordering::SeqCst);
            self.fill_text
                .clone()
                .ok_or_else(|| crate::Error::External("generation down".to_string()))
        }
    }

    fn scraped(word: &str, definition: &str) -> Candidate {
        let mut c = Candidate::bare(word, "Webster");
        c.definition = Some(definition.to_string());
        c
    }

    fn pipeline(
        store: Arc<MemoryStore>,
        providers: Vec<Arc<FakeProvider>>,
        generation: Arc<FakeGeneration>,
    ) -> EnrichmentPipeline {
        EnrichmentPipeline::new(
            store,
            providers
                .into_iter()
                .map(|p| p as Arc<dyn DictionaryProvider>)
                .collect(),
            generation,
        )
    }

    #[tokio::test]
    async fn first_successful_provider_short_circuits() {
        let store = Arc::new(MemoryStore::new());
        store
            .set_source_prefs(
                UserId(1),
                &["Merriam-Webster".to_string(), "Cambridge".to_string()],
            )
            .await
            .unwrap();

        let webster = FakeProvider::returning("Merriam-Webster", vec![scraped("run", "move fast")]);
        let cambridge = FakeProvider::returning("Cambridge", vec![scraped("run", "other")]);
        let generation = Arc::new(FakeGeneration {
            fill_text: Some(String::new()),
            ..Default::default()
        });

        let p = pipeline(
            store,
            vec![cambridge.clone(), webster.clone()],
            generation.clone(),
        );
        let got = p.enrich("run", UserId(1)).await.unwrap();

        assert_eq!(got.len(), 1);
        assert_eq!(got[0].source, "Webster");
        assert_eq!(webster.calls(), 1);
        assert_eq!(cambridge.calls(), 0);
        assert_eq!(generation.generate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn provider_error_falls_through_to_next() {
        let store = Arc::new(MemoryStore::new());
        let cambridge = FakeProvider::failing("Cambridge");
        let webster = FakeProvider::returning("Merriam-Webster", vec![scraped("run", "move fast")]);
        let generation = Arc::new(FakeGeneration {
            fill_text: Some(String::new()),
            ..Default::default()
        });

        // No prefs saved: registration order applies.
        let p = pipeline(store, vec![cambridge.clone(), webster.clone()], generation);
        let got = p.enrich("run", UserId(1)).await.unwrap();

        assert_eq!(got.len(), 1);
        assert_eq!(cambridge.calls(), 1);
        assert_eq!(webster.calls(), 1);
    }

    #[tokio::test]
    async fn unrecognized_pref_names_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        store
            .set_source_prefs(
                UserId(1),
                &["Oxford".to_string(), "Cambridge".to_string()],
            )
            .await
            .unwrap();

        let cambridge = FakeProvider::returning("Cambridge", vec![scraped("run", "move fast")]);
        let generation = Arc::new(FakeGeneration {
            fill_text: Some(String::new()),
            ..Default::default()
        });

        let p = pipeline(store, vec![cambridge.clone()], generation);
        let got = p.enrich("run", UserId(1)).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(cambridge.calls(), 1);
    }

    #[tokio::test]
    async fn total_miss_falls_back_to_full_generation() {
        let store = Arc::new(MemoryStore::new());
        let empty = FakeProvider::returning("Cambridge", Vec::new());
        let generation = Arc::new(FakeGeneration {
            generate_text: Some(
                "Item 1\nWord: drink\nPOS: Noun\nLevel: A1\nDef: a liquid\nEx: a cold drink\nPron: /drɪŋk/\n---\nItem 2\nPOS: Verb\nDef: to swallow liquid\n"
                    .to_string(),
            ),
            ..Default::default()
        });

        let p = pipeline(store.clone(), vec![empty], generation.clone());
        let got = p.enrich("drink", UserId(1)).await.unwrap();

        assert_eq!(got.len(), 2);
        assert_eq!(generation.generate_calls.load(Ordering::SeqCst), 1);
        // Full generation never triggers the per-field augmentation pass.
        assert_eq!(generation.fill_calls.load(Ordering::SeqCst), 0);

        let saved = p.persist(got, "General").await.unwrap();
        assert_eq!(saved, 2);
        let titles: Vec<String> = store
            .list_words(10)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.word)
            .collect();
        assert!(titles.contains(&"drink (Noun)".to_string()));
        assert!(titles.contains(&"drink (Verb)".to_string()));
    }

    #[tokio::test]
    async fn augmentation_fills_only_missing_fields() {
        let store = Arc::new(MemoryStore::new());
        let mut candidate = scraped("drink", "a liquid for swallowing");
        candidate.example = Some("a cold drink".to_string());
        let provider = FakeProvider::returning("Cambridge", vec![candidate]);

        let generation = Arc::new(FakeGeneration {
            fill_text: Some(
                "def: WRONG definition\nex: WRONG example\npron: /drɪŋk/\npos: Noun\nlevel: A1\n"
                    .to_string(),
            ),
            ..Default::default()
        });

        let p = pipeline(store, vec![provider], generation.clone());
        let got = p.enrich("drink", UserId(9)).await.unwrap();

        assert_eq!(generation.fill_calls.load(Ordering::SeqCst), 1);
        let c = &got[0];
        assert_eq!(c.definition.as_deref(), Some("a liquid for swallowing"));
        assert_eq!(c.example.as_deref(), Some("a cold drink"));
        assert_eq!(c.pronunciation.as_deref(), Some("/drɪŋk/"));
        assert_eq!(c.part_of_speech.as_deref(), Some("Noun"));
        assert_eq!(c.level, Some(Level::A1));
    }

    #[tokio::test]
    async fn augmentation_failure_keeps_partial_candidate() {
        let store = Arc::new(MemoryStore::new());
        let provider = FakeProvider::returning("Cambridge", vec![scraped("drink", "a liquid")]);
        let generation = Arc::new(FakeGeneration::default()); // fill_missing errors

        let p = pipeline(store, vec![provider], generation);
        let got = p.enrich("drink", UserId(1)).await.unwrap();

        assert_eq!(got.len(), 1);
        assert_eq!(got[0].definition.as_deref(), Some("a liquid"));
        assert!(got[0].pronunciation.is_none());
    }

    #[test]
    fn generation_blocks_require_a_definition() {
        let text = "Item 1\nPOS: Noun\nLevel: B1\n---\nItem 2\nPOS: Verb\nDef: to swallow\nnoise line\n";
        let parsed = parse_generation_blocks(text, "drink");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].part_of_speech.as_deref(), Some("Verb"));
        assert_eq!(parsed[0].definition.as_deref(), Some("to swallow"));
        assert_eq!(parsed[0].word, "drink");
        assert_eq!(parsed[0].source, "AI-Enhanced");
    }

    #[test]
    fn alias_lines_match_verbose_key_names() {
        let mut c = Candidate::bare("run", "Cambridge");
        apply_alias_line(&mut c, "Definition: to move fast");
        apply_alias_line(&mut c, "Example sentence: she runs daily");
        apply_alias_line(&mut c, "not a key value line");
        assert_eq!(c.definition.as_deref(), Some("to move fast"));
        assert_eq!(c.example.as_deref(), Some("she runs daily"));
    }
}
