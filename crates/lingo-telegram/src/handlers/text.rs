use std::sync::Arc;

use teloxide::prelude::*;

use lingo_core::{
    domain::{ChatId, UserId},
    engine::EngineAction,
    messaging::MessagingPort,
};

use crate::router::AppState;

pub async fn handle_text(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    let Some(text) = msg.text().map(|s| s.to_string()) else {
        return Ok(());
    };

    let user_id = UserId(user.id.0 as i64);
    let username = user.username.clone();
    let chat_id = ChatId(msg.chat.id.0);

    // One message at a time per chat; flow answers must apply in order.
    let _guard = state.chat_locks.lock_chat(chat_id.0).await;

    match state
        .engine
        .advance(user_id, username.as_deref(), &text)
        .await
    {
        Ok(reply) => {
            if let Err(e) = state
                .messenger
                .send_keyboard(chat_id, &reply.text, reply.keyboard)
                .await
            {
                eprintln!("[BOT] reply to {} failed: {e}", chat_id.0);
            }
            if reply.action == Some(EngineAction::SendBackup) {
                send_backup(&state, chat_id).await;
            }
        }
        Err(e) => {
            eprintln!("[BOT] engine error for {}: {e}", user_id.0);
            let _ = state
                .messenger
                .send_text(chat_id, "Something went wrong. Try again.")
                .await;
        }
    }

    Ok(())
}

async fn send_backup(state: &AppState, chat_id: ChatId) {
    let db_path = &state.cfg.db_path;
    let bytes = match tokio::fs::read(db_path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("[BOT] backup read failed: {e}");
            let _ = state
                .messenger
                .send_text(chat_id, "Backup failed: database file unavailable.")
                .await;
            return;
        }
    };
    let file_name = db_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "backup.db".to_string());

    if let Err(e) = state
        .messenger
        .send_document(chat_id, bytes, &file_name, "🛡 Database backup")
        .await
    {
        eprintln!("[BOT] backup send failed: {e}");
    }
}
