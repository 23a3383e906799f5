use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::FixedOffset;

use crate::{errors::Error, Result};

/// Fixed fallback provider order, used when a user has no saved preference.
pub const DEFAULT_SOURCES: [&str; 2] = ["Cambridge", "Merriam-Webster"];

/// Typed configuration loaded from the environment (with `.env` support).
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub bot_token: String,
    pub admin_ids: Vec<i64>,
    pub db_path: PathBuf,

    // Generation service (Groq OpenAI-compatible endpoint)
    pub groq_api_key: String,
    pub groq_model: String,
    pub generation_timeout: Duration,

    // Dictionary scraping
    pub scrape_timeout: Duration,
    pub user_agent: String,

    // Delivery scheduling
    /// Operating timezone as a fixed UTC offset. Delivery matching only needs
    /// wall-clock hour:minute, so a named-zone database is not required.
    pub tz_offset: FixedOffset,
    pub tick_interval: Duration,
    /// `HH:MM` at which the daily store snapshot is sent to admins.
    pub backup_time: String,

    // Conversation sessions
    pub session_idle_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let bot_token = env_str("BOT_TOKEN").unwrap_or_default();
        if bot_token.trim().is_empty() {
            return Err(Error::Config(
                "BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let groq_api_key = env_str("GROQ_API_KEY").unwrap_or_default();
        if groq_api_key.trim().is_empty() {
            return Err(Error::Config(
                "GROQ_API_KEY environment variable is required".to_string(),
            ));
        }

        let admin_ids = parse_csv_i64(env_str("ADMIN_IDS"));
        let db_path = env_path("DB_PATH").unwrap_or_else(|| PathBuf::from("daily_words.db"));

        let groq_model =
            env_str("GROQ_MODEL").unwrap_or_else(|| "llama-3.1-8b-instant".to_string());
        let generation_timeout =
            Duration::from_millis(env_u64("GENERATION_TIMEOUT_MS").unwrap_or(20_000));

        let scrape_timeout = Duration::from_millis(env_u64("SCRAPE_TIMEOUT_MS").unwrap_or(10_000));
        let user_agent = env_str("SCRAPER_USER_AGENT").unwrap_or_else(|| "Mozilla/5.0".to_string());

        // Default +03:30 (the deployment the bot was written for).
        let offset_minutes = env_i64("TZ_OFFSET_MINUTES").unwrap_or(210);
        let tz_offset = FixedOffset::east_opt((offset_minutes * 60) as i32)
            .ok_or_else(|| Error::Config(format!("invalid TZ_OFFSET_MINUTES: {offset_minutes}")))?;

        let tick_interval = Duration::from_secs(env_u64("TICK_INTERVAL_SECS").unwrap_or(60));
        let backup_time = env_str("BACKUP_TIME").unwrap_or_else(|| "00:00".to_string());
        if !crate::engine::is_valid_hhmm(&backup_time) {
            return Err(Error::Config(format!(
                "BACKUP_TIME must be HH:MM, got {backup_time}"
            )));
        }

        let session_idle_timeout =
            Duration::from_secs(env_u64("SESSION_IDLE_TIMEOUT_SECS").unwrap_or(900));

        Ok(Self {
            bot_token,
            admin_ids,
            db_path,
            groq_api_key,
            groq_model,
            generation_timeout,
            scrape_timeout,
            user_agent,
            tz_offset,
            tick_interval,
            backup_time,
            session_idle_timeout,
        })
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_i64(key: &str) -> Option<i64> {
    env_str(key).and_then(|s| s.trim().parse::<i64>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}
