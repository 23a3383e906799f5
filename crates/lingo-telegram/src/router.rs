use std::{collections::HashMap, sync::Arc};

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tokio::sync::{Mutex, OwnedMutexGuard};

use lingo_core::{
    config::Config, engine::ConversationEngine, messaging::MessagingPort,
    scheduler::DailyScheduler, store::WordStore,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub engine: Arc<ConversationEngine>,
    pub messenger: Arc<TelegramMessenger>,
    pub chat_locks: Arc<ChatLocks>,
}

/// Per-chat mutexes so one user's messages are handled strictly in order;
/// a mid-flow user sending two answers quickly must not interleave.
#[derive(Default)]
pub struct ChatLocks {
    inner: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl ChatLocks {
    pub async fn lock_chat(&self, chat_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(chat_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

pub async fn run_polling(
    cfg: Arc<Config>,
    store: Arc<dyn WordStore>,
    engine: Arc<ConversationEngine>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.bot_token.clone());

    if let Ok(me) = bot.get_me().await {
        println!("lingo started: @{}", me.username());
    }
    println!("Database: {}", cfg.db_path.display());
    println!("Admins: {}", cfg.admin_ids.len());

    let messenger = Arc::new(TelegramMessenger::new(bot.clone()));

    let scheduler = DailyScheduler::new(
        store,
        messenger.clone() as Arc<dyn MessagingPort>,
        cfg.tz_offset,
        cfg.tick_interval,
        cfg.backup_time.clone(),
        cfg.admin_ids.clone(),
        cfg.db_path.clone(),
    );
    tokio::spawn(async move { scheduler.run().await });

    let state = Arc::new(AppState {
        cfg,
        engine,
        messenger,
        chat_locks: Arc::new(ChatLocks::default()),
    });

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
