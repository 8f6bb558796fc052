//! Outbound message lifecycle. The bot keeps a single "screen" per chat:
//! before sending a new message it deletes the previous one, whose id is
//! tracked in the session. Transient notices skip both the deletion and the
//! tracking, so they stay visible next to the following screen.
//!
//! Transport failures are terminal here: deletions fail routinely (the
//! message may be gone or too old) and are logged at debug level, failed
//! sends are logged and dropped. Neither reaches the dialogue handlers.

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, ParseMode};

use crate::common::BotEnv;
use crate::keyboards;

/// Replace the previous bot message in this chat with a new one.
pub async fn send_screen(
    bot: &Bot,
    env: &BotEnv,
    chat_id: ChatId,
    user_id: UserId,
    text: impl Into<String>,
    markup: Option<InlineKeyboardMarkup>,
) {
    delete_last_message(bot, env, chat_id, user_id).await;
    match send(bot, chat_id, text.into(), markup).await {
        Ok(sent) => env
            .sessions
            .update(user_id, |s| s.last_message_id = Some(sent.id)),
        Err(e) => {
            log::error!("failed to send message to chat {chat_id}: {e}");
        }
    }
}

/// Send a message that is kept alongside the next screen.
pub async fn send_notice(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
) {
    if let Err(e) = send(bot, chat_id, text.into(), None).await {
        log::error!("failed to send message to chat {chat_id}: {e}");
    }
}

pub async fn send_main_menu(
    bot: &Bot,
    env: &BotEnv,
    chat_id: ChatId,
    user_id: UserId,
) {
    send_screen(
        bot,
        env,
        chat_id,
        user_id,
        "Choose an event type:",
        Some(keyboards::main_menu()),
    )
    .await;
}

/// The handler-boundary error policy: log the failure with its context,
/// apologize and show the main menu. The session is left as it was.
pub async fn report_step_error(
    bot: &Bot,
    env: &BotEnv,
    chat_id: ChatId,
    user_id: UserId,
    payload: &str,
    err: &anyhow::Error,
) {
    log::error!(
        "dialogue step failed in chat {chat_id} for user {user_id} \
         (payload {payload:?}): {err:#}"
    );
    send_notice(
        bot,
        chat_id,
        "Something went wrong. Please try again later or contact an \
         administrator.",
    )
    .await;
    send_main_menu(bot, env, chat_id, user_id).await;
}

async fn delete_last_message(
    bot: &Bot,
    env: &BotEnv,
    chat_id: ChatId,
    user_id: UserId,
) {
    let last_message_id =
        env.sessions.get(user_id).and_then(|s| s.last_message_id);
    if let Some(message_id) = last_message_id {
        if let Err(e) = bot.delete_message(chat_id, message_id).await {
            log::debug!(
                "could not delete message {} in chat {chat_id}: {e}",
                message_id.0
            );
        }
    }
}

async fn send(
    bot: &Bot,
    chat_id: ChatId,
    text: String,
    markup: Option<InlineKeyboardMarkup>,
) -> Result<Message, teloxide::RequestError> {
    let mut request = bot
        .send_message(chat_id, text)
        .parse_mode(ParseMode::Html)
        .disable_web_page_preview(true);
    if let Some(markup) = markup {
        request = request.reply_markup(markup);
    }
    request.await
}
