//! The user's own upcoming events, grouped by category.

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;

use crate::common::{self, BotEnv, UpdateHandler};
use crate::models::{AttendanceStatus, Category, Event};
use crate::utils::ResultExt;
use crate::{keyboards, reply};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallbackData {
    Overview,
    Category(Category),
}

pub fn callback_handler() -> UpdateHandler {
    dptree::filter_map(filter_callbacks).endpoint(handle_callback)
}

fn filter_callbacks(callback: CallbackQuery) -> Option<CallbackData> {
    parse_callback(callback.data.as_deref()?)
}

pub(crate) fn parse_callback(data: &str) -> Option<CallbackData> {
    if data == "m" {
        return Some(CallbackData::Overview);
    }
    if let Some(cat) = data.strip_prefix("mc:") {
        return Some(CallbackData::Category(cat.parse().ok()?));
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
        CallbackData::Overview => {
            show_overview(&bot, &env, chat_id, user_id).await
        }
        CallbackData::Category(category) => {
            show_category(&bot, &env, chat_id, user_id, category).await
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

async fn show_overview(
    bot: &Bot,
    env: &BotEnv,
    chat_id: ChatId,
    user_id: UserId,
) -> Result<()> {
    let events =
        env.cached_user_events(user_id.into(), AttendanceStatus::Going)?;
    if events.is_empty() {
        reply::send_screen(
            bot,
            env,
            chat_id,
            user_id,
            "You are not going to any events yet.",
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
        "Choose a category of your events:",
        Some(keyboards::my_categories(&categories_present(&events))),
    )
    .await;
    Ok(())
}

async fn show_category(
    bot: &Bot,
    env: &BotEnv,
    chat_id: ChatId,
    user_id: UserId,
    category: Category,
) -> Result<()> {
    let events =
        env.cached_user_events(user_id.into(), AttendanceStatus::Going)?;
    let selected: Vec<Event> = events
        .iter()
        .filter(|e| e.category == category)
        .cloned()
        .collect();

    if selected.is_empty() {
        reply::send_screen(
            bot,
            env,
            chat_id,
            user_id,
            "You have no events in this category.",
            Some(keyboards::back_to_main()),
        )
        .await;
        return Ok(());
    }

    let mut text = format!("Your {category} events:\n\n");
    for (index, event) in selected.iter().enumerate() {
        common::write_event_list_item(&mut text, index + 1, event);
    }
    text.push_str("Send an event number to see the details.");
    env.sessions.update(user_id, |s| s.events = Some(selected));
    reply::send_screen(
        bot,
        env,
        chat_id,
        user_id,
        text,
        Some(keyboards::back_to_main()),
    )
    .await;
    Ok(())
}

/// Categories that actually occur in the listing, in canonical order.
fn categories_present(events: &[Event]) -> Vec<Category> {
    Category::ALL
        .iter()
        .copied()
        .filter(|cat| events.iter().any(|e| e.category == *cat))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboards::callback_data;
    use crate::models::EventType;

    fn event(id: i32, category: Category) -> Event {
        let now = chrono::Utc::now().naive_utc();
        Event {
            id,
            name: format!("event {id}"),
            location: "Loft".to_string(),
            address: "Main st. 1".to_string(),
            event_type: EventType::Offline,
            category,
            date_time: now + chrono::Duration::days(1),
            details: None,
            map_link: None,
            is_private: false,
            channel_id: None,
            created_at: now,
        }
    }

    #[test]
    fn parses_known_callbacks() {
        assert_eq!(parse_callback("m"), Some(CallbackData::Overview));
        assert_eq!(
            parse_callback("mc:marathon"),
            Some(CallbackData::Category(Category::Marathon))
        );
        assert_eq!(parse_callback("mc:brunch"), None);
        assert_eq!(parse_callback("my"), None);
    }

    #[test]
    fn present_categories_keep_canonical_order() {
        let events = [
            event(1, Category::Training),
            event(2, Category::Concert),
            event(3, Category::Training),
        ];
        assert_eq!(
            categories_present(&events),
            [Category::Concert, Category::Training]
        );
        assert!(categories_present(&[]).is_empty());
    }

    #[test]
    fn category_keyboard_round_trips_through_the_parser() {
        let markup =
            keyboards::my_categories(&[Category::Concert, Category::Meeting]);
        let parsed: Vec<_> = callback_data(&markup)
            .into_iter()
            .map(parse_callback)
            .collect();
        assert_eq!(
            parsed[..2],
            [
                Some(CallbackData::Category(Category::Concert)),
                Some(CallbackData::Category(Category::Meeting)),
            ]
        );
    }
}
