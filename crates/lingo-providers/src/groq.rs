//! Groq chat-completions adapter behind the generation service port.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use lingo_core::{
    providers::{Candidate, CandidateField, GenerationService},
    Error, Result,
};

const CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

#[derive(Clone, Debug)]
pub struct GroqClient {
    api_key: String,
    model: String,
    http: reqwest::Client,
}

impl GroqClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client build");
        Self {
            api_key: api_key.into(),
            model: model.into(),
            http,
        }
    }

    async fn chat(&self, prompt: String) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": 0.3,
        });

        let resp = self
            .http
            .post(CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::External(format!("groq request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "groq completion failed: {status} {}",
                text.chars().take(200).collect::<String>()
            )));
        }

        let v: Value = resp
            .json()
            .await
            .map_err(|e| Error::External(format!("groq json error: {e}")))?;
        extract_content(&v)
    }
}

fn extract_content(v: &Value) -> Result<String> {
    let text = v["choices"][0]["message"]["content"]
        .as_str()
        .unwrap_or("")
        .trim()
        .to_string();
    if text.is_empty() {
        return Err(Error::External("groq returned an empty completion".to_string()));
    }
    Ok(text)
}

fn generate_prompt(word: &str) -> String {
    format!(
        "You are a linguist. Analyze the word: \"{word}\".\n\
         If it has multiple parts of speech (e.g. 'drink' is a Verb AND a Noun), \
         output them as SEPARATE items.\n\n\
         STRICT FORMAT:\n\
         Item 1\n\
         Word: {word}\n\
         POS: [Noun/Verb/etc]\n\
         Level: [A1-C2]\n\
         Def: [Definition]\n\
         Ex: [Example sentence]\n\
         Pron: [IPA]\n\
         ---\n\
         Item 2 (if exists)\n\
         ..."
    )
}

fn fill_prompt(candidate: &Candidate, missing: &[CandidateField]) -> String {
    let missing = missing
        .iter()
        .map(|f| f.label())
        .collect::<Vec<_>>()
        .join(", ");

    let mut known = Vec::new();
    if let Some(pos) = &candidate.part_of_speech {
        known.push(format!("pos: {pos}"));
    }
    if let Some(level) = candidate.level {
        known.push(format!("level: {level}"));
    }
    if let Some(def) = &candidate.definition {
        known.push(format!("def: {def}"));
    }
    if let Some(ex) = &candidate.example {
        known.push(format!("ex: {ex}"));
    }
    if let Some(pron) = &candidate.pronunciation {
        known.push(format!("pron: {pron}"));
    }

    format!(
        "Fill the missing fields for the word \"{}\".\n\
         Return exactly one `key: value` line per missing field, nothing else.\n\
         Missing fields: {missing}\n\
         Known fields:\n{}",
        candidate.word,
        known.join("\n")
    )
}

#[async_trait]
impl GenerationService for GroqClient {
    async fn generate(&self, word: &str) -> Result<String> {
        self.chat(generate_prompt(word)).await
    }

    async fn fill_missing(
        &self,
        candidate: &Candidate,
        missing: &[CandidateField],
    ) -> Result<String> {
        self.chat(fill_prompt(candidate, missing)).await
    }
}
