//! Merriam-Webster scraper.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use lingo_core::{
    providers::{Candidate, DictionaryProvider},
    Result,
};

use crate::scrape::{fetch_html, first_capture, http_client};

const SOURCE: &str = "Merriam-Webster";

pub struct WebsterProvider {
    http: reqwest::Client,
    pos: Regex,
    definition: Regex,
    example: Regex,
    pronunciation: Regex,
}

impl WebsterProvider {
    pub fn new(user_agent: &str, timeout: Duration) -> Self {
        Self {
            http: http_client(user_agent, timeout),
            pos: Regex::new(r#"<a class="important-blue-link"[^>]*>(.*?)</a>"#)
                .expect("static regex"),
            definition: Regex::new(r#"(?s)<span class="dtText">(.*?)</span>"#)
                .expect("static regex"),
            example: Regex::new(r#"(?s)<span class="ex-sent[^"]*"[^>]*>(.*?)</span>"#)
                .expect("static regex"),
            pronunciation: Regex::new(r#"<span class="pr">(.*?)</span>"#).expect("static regex"),
        }
    }

    /// First sense of the page. Webster carries no CEFR level; the
    /// augmentation pass supplies it.
    fn parse(&self, word: &str, html: &str) -> Option<Candidate> {
        let definition = first_capture(&self.definition, html)
            .map(|d| d.trim_start_matches(':').trim().to_string())
            .filter(|d| !d.is_empty())?;

        let mut candidate = Candidate::bare(word, SOURCE);
        candidate.definition = Some(definition);
        candidate.part_of_speech = first_capture(&self.pos, html);
        candidate.example = first_capture(&self.example, html);
        candidate.pronunciation = first_capture(&self.pronunciation, html);
        Some(candidate)
    }
}

#[async_trait]
impl DictionaryProvider for WebsterProvider {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn lookup(&self, word: &str) -> Result<Vec<Candidate>> {
        let url = format!(
            "https://www.merriam-webster.com/dictionary/{}",
            word.trim().to_lowercase()
        );
        let Some(html) = fetch_html(&self.http, &url, SOURCE).await? else {
            return Ok(Vec::new());
        };
        Ok(self.parse(word, &html).into_iter().collect())
    }
}
