//! Daily word delivery plus the nightly admin backup.
//!
//! One tick per `tick_interval` (a minute in production). A profile is due
//! when the current wall-clock HH:MM in the configured offset equals its
//! saved time; `last_sent_date` makes delivery at-most-once per day even if
//! several ticks land inside the same minute. There is no catch-up for
//! missed windows.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};

use crate::{
    domain::{ChatId, UserProfile},
    formatting::word_card,
    messaging::MessagingPort,
    store::{WordFilter, WordStore},
    Result,
};

pub struct DailyScheduler {
    store: Arc<dyn WordStore>,
    messenger: Arc<dyn MessagingPort>,
    tz: FixedOffset,
    tick_interval: Duration,
    backup_time: String,
    admin_ids: Vec<i64>,
    db_path: PathBuf,
}

impl DailyScheduler {
    pub fn new(
        store: Arc<dyn WordStore>,
        messenger: Arc<dyn MessagingPort>,
        tz: FixedOffset,
        tick_interval: Duration,
        backup_time: String,
        admin_ids: Vec<i64>,
        db_path: PathBuf,
    ) -> Self {
        Self {
            store,
            messenger,
            tz,
            tick_interval,
            backup_time,
            admin_ids,
            db_path,
        }
    }

    /// Tick forever. Run this on its own task; it never returns.
    pub async fn run(&self) {
        println!(
            "[SCHED] started (tick {}s, backup at {})",
            self.tick_interval.as_secs(),
            self.backup_time
        );
        let mut interval = tokio::time::interval(self.tick_interval);
        loop {
            interval.tick().await;
            let now = Utc::now().with_timezone(&self.tz);
            if let Err(e) = self.tick_at(now).await {
                eprintln!("[SCHED] tick failed: {e}");
            }
        }
    }

    /// One scheduling pass at a fixed instant. Split out so tests can drive
    /// the clock.
    pub async fn tick_at(&self, now: DateTime<FixedOffset>) -> Result<()> {
        let hhmm = now.format("%H:%M").to_string();
        let today = now.date_naive();

        for profile in self.store.due_profiles(&hhmm).await? {
            if profile.last_sent_date == Some(today) {
                continue;
            }
            // Due users are independent: one failing delivery must not take
            // down the rest of the tick.
            if let Err(e) = self.deliver(&profile, today).await {
                eprintln!("[SCHED] delivery for user {} failed: {e}", profile.user_id.0);
            }
        }

        if hhmm == self.backup_time {
            self.send_backup().await;
        }
        Ok(())
    }

    async fn deliver(&self, profile: &UserProfile, today: chrono::NaiveDate) -> Result<()> {
        let filter = WordFilter {
            level: profile.daily_level,
            pos: profile.daily_pos.clone(),
        };
        let words = self.store.random_words(&filter, profile.daily_count).await?;
        if words.is_empty() {
            println!(
                "[SCHED] nothing matches filters for user {}, skipping",
                profile.user_id.0
            );
            return Ok(());
        }

        let cards = words.iter().map(word_card).collect::<Vec<_>>().join("\n\n");
        let text = format!("⏰ <b>Your daily words</b>\n\n{cards}");

        let chat = ChatId(profile.user_id.0);
        if let Err(e) = self.messenger.send_text(chat, &text).await {
            eprintln!("[SCHED] delivery to {} failed: {e}", profile.user_id.0);
        }
        // Recorded even when the send failed, so a broken chat does not get
        // retried every tick inside the window.
        self.store.mark_sent(profile.user_id, today).await?;
        println!(
            "[SCHED] sent {} words to user {}",
            words.len(),
            profile.user_id.0
        );
        Ok(())
    }

    async fn send_backup(&self) {
        let bytes = match tokio::fs::read(&self.db_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                eprintln!(
                    "[SCHED] backup skipped, cannot read {}: {e}",
                    self.db_path.display()
                );
                return;
            }
        };
        let file_name = self
            .db_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "backup.db".to_string());

        for admin in &self.admin_ids {
            let caption = format!("🛡 Daily database backup ({})", Utc::now().format("%Y-%m-%d"));
            if let Err(e) = self
                .messenger
                .send_document(ChatId(*admin), bytes.clone(), &file_name, &caption)
                .await
            {
                eprintln!("[SCHED] backup to admin {admin} failed: {e}");
            }
        }
    }
}
