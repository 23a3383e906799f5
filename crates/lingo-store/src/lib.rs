//! SQLite-backed implementation of the word store port.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use lingo_core::{
    domain::{DailySettings, Level, NewWordEntry, UserId, UserProfile, WordEntry},
    store::{SearchField, WordFilter, WordStore},
    Error, Result,
};

/// (id, topic, word, definition, example, pronunciation, level, source)
type WordRow = (i64, String, String, String, String, String, String, String);

/// (user_id, username, daily_enabled, daily_count, daily_time, daily_level,
/// daily_pos, source_prefs, last_sent_date)
type UserRow = (
    i64,
    Option<String>,
    i64,
    i64,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<NaiveDate>,
);

const WORD_COLS: &str = "id, topic, word, definition, example, pronunciation, level, source";
const USER_COLS: &str = "user_id, username, daily_enabled, daily_count, daily_time, \
                         daily_level, daily_pos, source_prefs, last_sent_date";

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database file and run migrations.
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
            .map_err(|e| Error::Store(format!("invalid db path: {e}")))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        Self::connect(opts, 4).await
    }

    async fn connect(opts: SqliteConnectOptions, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await
            .map_err(|e| Error::Store(format!("failed to connect to sqlite: {e}")))?;

        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS _migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .execute(pool)
        .await
        .map_err(db)?;

        let migrations: &[(&str, &str)] =
            &[("001_init", include_str!("../migrations/001_init.sql"))];

        for (name, sql) in migrations {
            let applied: Option<(String,)> =
                sqlx::query_as("SELECT name FROM _migrations WHERE name = ?")
                    .bind(name)
                    .fetch_optional(pool)
                    .await
                    .map_err(db)?;
            if applied.is_some() {
                continue;
            }

            sqlx::raw_sql(sql)
                .execute(pool)
                .await
                .map_err(|e| Error::Store(format!("migration {name} failed: {e}")))?;
            sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
                .bind(name)
                .execute(pool)
                .await
                .map_err(db)?;
        }
        Ok(())
    }
}

fn db(e: sqlx::Error) -> Error {
    Error::Store(e.to_string())
}

fn to_entry(row: WordRow) -> WordEntry {
    let (id, topic, word, definition, example, pronunciation, level, source) = row;
    WordEntry {
        id,
        topic,
        word,
        definition,
        example,
        pronunciation,
        level: Level::parse(&level),
        source,
    }
}

fn to_profile(row: UserRow) -> UserProfile {
    let (
        user_id,
        username,
        daily_enabled,
        daily_count,
        daily_time,
        daily_level,
        daily_pos,
        source_prefs,
        last_sent_date,
    ) = row;
    UserProfile {
        user_id: UserId(user_id),
        username,
        daily_enabled: daily_enabled != 0,
        daily_count: daily_count.max(1) as u32,
        daily_time,
        daily_level: daily_level.as_deref().map(Level::parse),
        daily_pos,
        source_prefs: source_prefs
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok()),
        last_sent_date,
    }
}

#[async_trait]
impl WordStore for SqliteStore {
    async fn ensure_user(&self, user: UserId, username: Option<&str>) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (user_id, username) VALUES (?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
               username = COALESCE(excluded.username, users.username)",
        )
        .bind(user.0)
        .bind(username)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn insert_words(&self, entries: &[NewWordEntry]) -> Result<usize> {
        let mut tx = self.pool.begin().await.map_err(db)?;
        let mut count = 0usize;
        for e in entries {
            if e.definition.trim().is_empty() {
                continue;
            }
            sqlx::query(
                "INSERT INTO words (topic, word, definition, example, pronunciation, level, source)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&e.topic)
            .bind(&e.word)
            .bind(&e.definition)
            .bind(&e.example)
            .bind(&e.pronunciation)
            .bind(e.level.as_str())
            .bind(&e.source)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
            count += 1;
        }
        tx.commit().await.map_err(db)?;
        Ok(count)
    }

    async fn random_words(&self, filter: &WordFilter, count: u32) -> Result<Vec<WordEntry>> {
        let mut sql = format!("SELECT {WORD_COLS} FROM words");
        let mut clauses = Vec::new();
        if filter.level.is_some() {
            clauses.push("level = ?");
        }
        if filter.pos.is_some() {
            clauses.push("word LIKE ?");
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY RANDOM() LIMIT ?");

        let mut query = sqlx::query_as::<_, WordRow>(&sql);
        if let Some(level) = filter.level {
            query = query.bind(level.as_str());
        }
        if let Some(pos) = &filter.pos {
            query = query.bind(format!("%({})%", pos.trim().to_lowercase()));
        }
        let rows = query
            .bind(count as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;
        Ok(rows.into_iter().map(to_entry).collect())
    }

    async fn list_words(&self, limit: u32) -> Result<Vec<WordEntry>> {
        let rows: Vec<WordRow> = sqlx::query_as(&format!(
            "SELECT {WORD_COLS} FROM words ORDER BY topic, level, word LIMIT ?"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        Ok(rows.into_iter().map(to_entry).collect())
    }

    async fn search_words(&self, field: SearchField, query: &str) -> Result<Vec<WordEntry>> {
        let column = match field {
            SearchField::Word => "word",
            SearchField::Level => "level",
            SearchField::Topic => "topic",
        };
        let rows: Vec<WordRow> = sqlx::query_as(&format!(
            "SELECT {WORD_COLS} FROM words WHERE {column} LIKE ? ORDER BY word"
        ))
        .bind(format!("%{}%", query.trim()))
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        Ok(rows.into_iter().map(to_entry).collect())
    }

    async fn clear_words(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM words")
            .execute(&self.pool)
            .await
            .map_err(db)?;
        Ok(result.rows_affected())
    }

    async fn profile(&self, user: UserId) -> Result<Option<UserProfile>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLS} FROM users WHERE user_id = ?"))
                .bind(user.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(db)?;
        Ok(row.map(to_profile))
    }

    async fn upsert_daily(&self, user: UserId, settings: &DailySettings) -> Result<()> {
        // source_prefs and last_sent_date are deliberately untouched.
        sqlx::query(
            "INSERT INTO users (user_id, daily_enabled, daily_count, daily_time, daily_level, daily_pos)
             VALUES (?, 1, ?, ?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
               daily_enabled = 1,
               daily_count = excluded.daily_count,
               daily_time = excluded.daily_time,
               daily_level = excluded.daily_level,
               daily_pos = excluded.daily_pos",
        )
        .bind(user.0)
        .bind(settings.count as i64)
        .bind(&settings.time)
        .bind(settings.level.map(|l| l.as_str()))
        .bind(&settings.pos)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn set_source_prefs(&self, user: UserId, prefs: &[String]) -> Result<()> {
        let json = serde_json::to_string(prefs)?;
        sqlx::query(
            "INSERT INTO users (user_id, source_prefs) VALUES (?, ?)
             ON CONFLICT(user_id) DO UPDATE SET source_prefs = excluded.source_prefs",
        )
        .bind(user.0)
        .bind(json)
        .execute(&self.pool)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn source_prefs(&self, user: UserId) -> Result<Option<Vec<String>>> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT source_prefs FROM users WHERE user_id = ?")
                .bind(user.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(db)?;
        Ok(row
            .and_then(|(json,)| json)
            .and_then(|json| serde_json::from_str(&json).ok()))
    }

    async fn due_profiles(&self, hhmm: &str) -> Result<Vec<UserProfile>> {
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLS} FROM users WHERE daily_enabled = 1 AND daily_time = ?"
        ))
        .bind(hhmm)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?;
        Ok(rows.into_iter().map(to_profile).collect())
    }

    async fn mark_sent(&self, user: UserId, date: NaiveDate) -> Result<()> {
        sqlx::query("UPDATE users SET last_sent_date = ? WHERE user_id = ?")
            .bind(date)
            .bind(user.0)
            .execute(&self.pool)
            .await
            .map_err(db)?;
        Ok(())
    }
}
