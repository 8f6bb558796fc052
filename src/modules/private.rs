//! Browsing events of private channels: channel, then event type, then
//! category, then a compact numbered list.
//!
//! The listings are windowed per user (events the user already attends are
//! filtered out up front), so each step after the first reads the groupings
//! stored in the session instead of the shared cache. A stale or expired
//! button sends the user back to the main menu.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use itertools::Itertools;
use teloxide::prelude::*;
use teloxide::utils::html::escape;

use crate::common::{self, BotEnv, UpdateHandler};
use crate::models::{Category, Event, EventType};
use crate::session::PrivateBrowse;
use crate::utils::ResultExt;
use crate::{keyboards, reply, store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallbackData {
    Channels,
    Channel(i32),
    Type(i32, EventType),
    Category(i32, EventType, Category),
}

pub fn callback_handler() -> UpdateHandler {
    dptree::filter_map(filter_callbacks).endpoint(handle_callback)
}

fn filter_callbacks(callback: CallbackQuery) -> Option<CallbackData> {
    parse_callback(callback.data.as_deref()?)
}

pub(crate) fn parse_callback(data: &str) -> Option<CallbackData> {
    if data == "p" {
        return Some(CallbackData::Channels);
    }
    if let Some(id) = data.strip_prefix("pc:") {
        return Some(CallbackData::Channel(id.parse().ok()?));
    }
    if let Some(rest) = data.strip_prefix("pt:") {
        let (id, ty) = rest.split_once(':')?;
        return Some(CallbackData::Type(id.parse().ok()?, ty.parse().ok()?));
    }
    if let Some(rest) = data.strip_prefix("px:") {
        let mut parts = rest.splitn(3, ':');
        let id = parts.next()?.parse().ok()?;
        let ty = parts.next()?.parse().ok()?;
        let cat = parts.next()?.parse().ok()?;
        return Some(CallbackData::Category(id, ty, cat));
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
        CallbackData::Channels => {
            show_channels(&bot, &env, chat_id, user_id).await
        }
        CallbackData::Channel(channel_id) => {
            show_channel(&bot, &env, chat_id, user_id, channel_id).await
        }
        CallbackData::Type(channel_id, ty) => {
            show_type(&bot, &env, chat_id, user_id, channel_id, ty).await;
            Ok(())
        }
        CallbackData::Category(channel_id, ty, cat) => {
            show_category(&bot, &env, chat_id, user_id, channel_id, ty, cat)
                .await;
            Ok(())
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

async fn show_channels(
    bot: &Bot,
    env: &BotEnv,
    chat_id: ChatId,
    user_id: UserId,
) -> Result<()> {
    let channels = store::list_channels(&mut env.conn())?;
    if channels.is_empty() {
        reply::send_screen(
            bot,
            env,
            chat_id,
            user_id,
            "No private channels available.",
            Some(keyboards::back_to_main()),
        )
        .await;
        return Ok(());
    }
    reply::send_screen(
        bot,
        env,
        chat_id,
        user_id,
        "Choose a private channel:",
        Some(keyboards::channels(&channels)),
    )
    .await;
    Ok(())
}

async fn show_channel(
    bot: &Bot,
    env: &BotEnv,
    chat_id: ChatId,
    user_id: UserId,
    channel_id: i32,
) -> Result<()> {
    let Some(channel) = store::channel_by_id(&mut env.conn(), channel_id)?
    else {
        reply::send_screen(
            bot,
            env,
            chat_id,
            user_id,
            "This channel is gone.",
            Some(keyboards::back_to_main()),
        )
        .await;
        return Ok(());
    };
    let attending =
        store::attending_event_ids(&mut env.conn(), user_id.into())?;
    let events: Vec<Event> =
        store::channel_upcoming_events(&mut env.conn(), channel_id)?
            .into_iter()
            .filter(|e| !attending.contains(&e.id))
            .collect();

    if events.is_empty() {
        reply::send_screen(
            bot,
            env,
            chat_id,
            user_id,
            format!("No upcoming events in {} yet.", escape(&channel.name)),
            Some(keyboards::back_to_main()),
        )
        .await;
        return Ok(());
    }

    let by_type = events.into_iter().into_group_map_by(|e| e.event_type);
    let types = types_present(&by_type);
    let text =
        format!("Choose an event type in {}:", escape(&channel.name));
    env.sessions.update(user_id, |s| {
        s.events = None;
        s.private = Some(PrivateBrowse {
            channel_id,
            channel_name: channel.name.clone(),
            by_type,
            by_category: None,
        });
    });
    reply::send_screen(
        bot,
        env,
        chat_id,
        user_id,
        text,
        Some(keyboards::private_types(channel_id, &types)),
    )
    .await;
    Ok(())
}

async fn show_type(
    bot: &Bot,
    env: &BotEnv,
    chat_id: ChatId,
    user_id: UserId,
    channel_id: i32,
    event_type: EventType,
) {
    let browse = env
        .sessions
        .get(user_id)
        .and_then(|s| s.private)
        .filter(|b| b.channel_id == channel_id);
    let Some(browse) = browse else {
        restart(bot, env, chat_id, user_id).await;
        return;
    };

    let events = browse.by_type.get(&event_type).cloned().unwrap_or_default();
    if events.is_empty() {
        reply::send_screen(
            bot,
            env,
            chat_id,
            user_id,
            format!(
                "No {event_type} events in {} right now.",
                escape(&browse.channel_name)
            ),
            Some(keyboards::back_to_main()),
        )
        .await;
        return;
    }

    let by_category = events.into_iter().into_group_map_by(|e| e.category);
    let categories = categories_present(&by_category);
    env.sessions.update(user_id, |s| {
        if let Some(p) = &mut s.private {
            p.by_category = Some((event_type, by_category));
        }
    });
    reply::send_screen(
        bot,
        env,
        chat_id,
        user_id,
        "Choose a category:",
        Some(keyboards::private_categories(
            channel_id,
            event_type,
            &categories,
        )),
    )
    .await;
}

async fn show_category(
    bot: &Bot,
    env: &BotEnv,
    chat_id: ChatId,
    user_id: UserId,
    channel_id: i32,
    event_type: EventType,
    category: Category,
) {
    let browse = env
        .sessions
        .get(user_id)
        .and_then(|s| s.private)
        .filter(|b| b.channel_id == channel_id);
    let Some(browse) = browse else {
        restart(bot, env, chat_id, user_id).await;
        return;
    };
    let events = match &browse.by_category {
        Some((ty, by_category)) if *ty == event_type => {
            by_category.get(&category).cloned().unwrap_or_default()
        }
        _ => {
            restart(bot, env, chat_id, user_id).await;
            return;
        }
    };

    if events.is_empty() {
        reply::send_screen(
            bot,
            env,
            chat_id,
            user_id,
            format!(
                "No {category} events in {}.",
                escape(&browse.channel_name)
            ),
            Some(keyboards::back_to_main()),
        )
        .await;
        return;
    }

    let mut text = format!(
        "Events in {} ({event_type}, {category}):\n\n",
        escape(&browse.channel_name)
    );
    for (index, event) in events.iter().enumerate() {
        common::write_compact_event_item(&mut text, index + 1, event);
    }
    text.push_str("\nSend an event number to see the details.");
    env.sessions.update(user_id, |s| s.events = Some(events));
    reply::send_screen(
        bot,
        env,
        chat_id,
        user_id,
        text,
        Some(keyboards::back_to_main()),
    )
    .await;
}

async fn restart(bot: &Bot, env: &BotEnv, chat_id: ChatId, user_id: UserId) {
    reply::send_screen(
        bot,
        env,
        chat_id,
        user_id,
        "That menu has expired. Please start over.",
        Some(keyboards::main_menu()),
    )
    .await;
}

fn types_present(by_type: &HashMap<EventType, Vec<Event>>) -> Vec<EventType> {
    EventType::ALL
        .iter()
        .copied()
        .filter(|ty| by_type.contains_key(ty))
        .collect()
}

fn categories_present(
    by_category: &HashMap<Category, Vec<Event>>,
) -> Vec<Category> {
    Category::ALL
        .iter()
        .copied()
        .filter(|cat| by_category.contains_key(cat))
        .collect()
}
