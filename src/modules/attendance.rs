//! RSVP actions on a single event: mark as going, edit the status of an
//! existing attendance, cancel it.
//!
//! Every mutation runs in one transaction together with its lookups, then
//! invalidates the cache buckets it made stale. Status edits and deletions
//! use the status the record had before the change, so the old bucket is
//! cleared too.

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;

use crate::common::{BotEnv, UpdateHandler};
use crate::models::AttendanceStatus;
use crate::utils::ResultExt;
use crate::{keyboards, reply, store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallbackData {
    Going(i32),
    EditStatus(EditAction, i32),
    /// A syntactically valid edit payload with an unrecognized action.
    EditUnknown,
    Cancel(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EditAction {
    Going,
    Delete,
}

pub fn callback_handler() -> UpdateHandler {
    dptree::filter_map(filter_callbacks).endpoint(handle_callback)
}

fn filter_callbacks(callback: CallbackQuery) -> Option<CallbackData> {
    parse_callback(callback.data.as_deref()?)
}

pub(crate) fn parse_callback(data: &str) -> Option<CallbackData> {
    if let Some(id) = data.strip_prefix("g:") {
        return Some(CallbackData::Going(id.parse().ok()?));
    }
    if let Some(rest) = data.strip_prefix("e:") {
        let (action, id) = rest.split_once(':')?;
        let id = id.parse().ok()?;
        return Some(match action {
            "going" => CallbackData::EditStatus(EditAction::Going, id),
            "delete" => CallbackData::EditStatus(EditAction::Delete, id),
            _ => CallbackData::EditUnknown,
        });
    }
    if let Some(id) = data.strip_prefix("x:") {
        return Some(CallbackData::Cancel(id.parse().ok()?));
    }
    None
}

async fn handle_callback(
    bot: Bot,
    env: Arc<BotEnv>,
    callback: CallbackQuery,
    data: CallbackData,
) -> Result<()> {
    bot.answer_callback_query(callback.id.clone())
        .await
        .log_error("answer callback query");
    let Some(message) = &callback.message else { return Ok(()) };
    let chat_id = message.chat.id;
    let user_id = callback.from.id;

    let result = match data {
        CallbackData::Going(event_id) => {
            mark_going(&bot, &env, chat_id, user_id, event_id).await
        }
        CallbackData::EditStatus(action, event_id) => {
            edit_status(&bot, &env, chat_id, user_id, action, event_id).await
        }
        CallbackData::EditUnknown => {
            reply::send_screen(
                &bot,
                &env,
                chat_id,
                user_id,
                "Unknown action.",
                Some(keyboards::back_to_main()),
            )
            .await;
            Ok(())
        }
        CallbackData::Cancel(event_id) => {
            cancel(&bot, &env, chat_id, user_id, event_id).await
        }
    };
    if let Err(e) = result {
        reply::report_step_error(
            &bot,
            &env,
            chat_id,
            user_id,
            callback.data.as_deref().unwrap_or_default(),
            &e,
        )
        .await;
    }
    Ok(())
}

async fn mark_going(
    bot: &Bot,
    env: &BotEnv,
    chat_id: ChatId,
    user_id: UserId,
    event_id: i32,
) -> Result<()> {
    let upserted = env.transaction(|conn| {
        let user = store::user_by_id(conn, user_id.into())?;
        let event = store::event_by_id(conn, event_id)?;
        match (user, event) {
            (Some(user), Some(event)) => store::upsert_attendance(
                conn,
                user.tg_id,
                event.id,
                AttendanceStatus::Going,
            )
            .map(Some),
            _ => Ok(None),
        }
    })?;

    if upserted.is_none() {
        reply::send_screen(
            bot,
            env,
            chat_id,
            user_id,
            "Event or user not found.",
            Some(keyboards::back_to_main()),
        )
        .await;
        return Ok(());
    }

    env.cache
        .invalidate_user(Some((user_id.into(), AttendanceStatus::Going)));
    reply::send_notice(bot, chat_id, "✅ You are marked as going.").await;
    reply::send_main_menu(bot, env, chat_id, user_id).await;
    log::info!("user {user_id} is going to event {event_id}");
    Ok(())
}

enum EditOutcome {
    NotFound,
    Updated { previous: AttendanceStatus },
    Deleted { previous: AttendanceStatus },
}

async fn edit_status(
    bot: &Bot,
    env: &BotEnv,
    chat_id: ChatId,
    user_id: UserId,
    action: EditAction,
    event_id: i32,
) -> Result<()> {
    let outcome = env.transaction(|conn| {
        let Some(attendance) =
            store::find_attendance(conn, user_id.into(), event_id)?
        else {
            return Ok(EditOutcome::NotFound);
        };
        match action {
            EditAction::Going => {
                store::upsert_attendance(
                    conn,
                    user_id.into(),
                    event_id,
                    AttendanceStatus::Going,
                )?;
                Ok(EditOutcome::Updated { previous: attendance.status })
            }
            EditAction::Delete => {
                store::delete_attendance(conn, user_id.into(), event_id)?;
                Ok(EditOutcome::Deleted { previous: attendance.status })
            }
        }
    })?;

    match outcome {
        EditOutcome::NotFound => {
            reply::send_screen(
                bot,
                env,
                chat_id,
                user_id,
                "Attendance not found.",
                Some(keyboards::back_to_main()),
            )
            .await;
        }
        EditOutcome::Updated { previous } => {
            env.cache.invalidate_user(Some((
                user_id.into(),
                AttendanceStatus::Going,
            )));
            env.cache.invalidate_user(Some((user_id.into(), previous)));
            reply::send_screen(
                bot,
                env,
                chat_id,
                user_id,
                "✅ Status updated to \"going\".",
                Some(keyboards::main_menu()),
            )
            .await;
            log::info!("user {user_id} re-confirmed event {event_id}");
        }
        EditOutcome::Deleted { previous } => {
            env.cache.invalidate_user(Some((user_id.into(), previous)));
            reply::send_screen(
                bot,
                env,
                chat_id,
                user_id,
                "🗑 Attendance removed.",
                Some(keyboards::main_menu()),
            )
            .await;
            log::info!("user {user_id} removed attendance for event {event_id}");
        }
    }
    Ok(())
}

async fn cancel(
    bot: &Bot,
    env: &BotEnv,
    chat_id: ChatId,
    user_id: UserId,
    event_id: i32,
) -> Result<()> {
    let deleted = env.transaction(|conn| {
        store::delete_attendance(conn, user_id.into(), event_id)
    })?;
    env.cache
        .invalidate_user(Some((user_id.into(), AttendanceStatus::Going)));
    if deleted > 0 {
        log::info!("user {user_id} cancelled attendance for event {event_id}");
    }
    reply::send_notice(bot, chat_id, "❌ You are no longer attending this event.")
        .await;
    reply::send_main_menu(bot, env, chat_id, user_id).await;
    Ok(())
}
