//! Cambridge Learner's Dictionary scraper.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use lingo_core::{
    domain::Level,
    providers::{Candidate, DictionaryProvider},
    Result,
};

use crate::scrape::{fetch_html, first_capture, http_client};

const SOURCE: &str = "Cambridge";

pub struct CambridgeProvider {
    http: reqwest::Client,
    pos: Regex,
    level: Regex,
    definition: Regex,
    example: Regex,
    pronunciation: Regex,
}

impl CambridgeProvider {
    pub fn new(user_agent: &str, timeout: Duration) -> Self {
        Self {
            http: http_client(user_agent, timeout),
            pos: Regex::new(r#"<span class="pos dpos"[^>]*>(.*?)</span>"#).expect("static regex"),
            level: Regex::new(r#"<span class="epp-xref[^"]*"[^>]*>(.*?)</span>"#)
                .expect("static regex"),
            definition: Regex::new(r#"(?s)<div class="def ddef_d[^"]*"[^>]*>(.*?)</div>"#)
                .expect("static regex"),
            example: Regex::new(r#"(?s)<div class="examp dexamp"[^>]*>(.*?)</div>"#)
                .expect("static regex"),
            pronunciation: Regex::new(r#"<span class="ipa[^"]*"[^>]*>(.*?)</span>"#)
                .expect("static regex"),
        }
    }

    /// First sense of the page, or `None` if no definition was found.
    fn parse(&self, word: &str, html: &str) -> Option<Candidate> {
        let definition = first_capture(&self.definition, html)
            .map(|d| d.trim_end_matches(':').trim().to_string())?;

        let mut candidate = Candidate::bare(word, SOURCE);
        candidate.definition = Some(definition);
        candidate.part_of_speech = first_capture(&self.pos, html);
        candidate.level = first_capture(&self.level, html).map(|l| Level::parse(&l));
        candidate.example = first_capture(&self.example, html);
        candidate.pronunciation = first_capture(&self.pronunciation, html).map(|p| format!("/{p}/"));
        Some(candidate)
    }
}

#[async_trait]
impl DictionaryProvider for CambridgeProvider {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn lookup(&self, word: &str) -> Result<Vec<Candidate>> {
        let url = format!(
            "https://dictionary.cambridge.org/dictionary/english/{}",
            word.trim().to_lowercase()
        );
        let Some(html) = fetch_html(&self.http, &url, SOURCE).await? else {
            return Ok(Vec::new());
        };
        Ok(self.parse(word, &html).into_iter().collect())
    }
}
