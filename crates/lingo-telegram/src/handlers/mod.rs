//! Telegram update handlers.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use crate::router::AppState;

mod text;

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    if msg.from().is_none() {
        return Ok(());
    }

    if let Some(body) = msg.text() {
        if body.trim() == "/version" {
            let _ = bot
                .send_message(
                    msg.chat.id,
                    format!("Lingo v{}", env!("CARGO_PKG_VERSION")),
                )
                .await;
            return Ok(());
        }
        return text::handle_text(msg, state).await;
    }

    // Non-text updates (stickers, photos, ...) are ignored.
    Ok(())
}
