//! Public browsing: event type, then category, then a numbered listing the
//! user selects from with a plain number, then the event detail screen.

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::InlineKeyboardMarkup;

use crate::common::{self, BotEnv, UpdateHandler};
use crate::models::{Category, Event, EventType};
use crate::utils::ResultExt;
use crate::{keyboards, reply, store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallbackData {
    BackToMain,
    SelectType(EventType),
    SelectCategory(EventType, Category),
}

pub fn callback_handler() -> UpdateHandler {
    dptree::filter_map(filter_callbacks).endpoint(handle_callback)
}

/// Handler for bare numbers selecting from the last shown listing.
pub fn selection_handler() -> UpdateHandler {
    dptree::filter_map(filter_selection).endpoint(handle_selection)
}

fn filter_callbacks(callback: CallbackQuery) -> Option<CallbackData> {
    parse_callback(callback.data.as_deref()?)
}

pub(crate) fn parse_callback(data: &str) -> Option<CallbackData> {
    if data == "b" {
        return Some(CallbackData::BackToMain);
    }
    if let Some(ty) = data.strip_prefix("t:") {
        return Some(CallbackData::SelectType(ty.parse().ok()?));
    }
    if let Some(rest) = data.strip_prefix("c:") {
        let (ty, cat) = rest.split_once(':')?;
        return Some(CallbackData::SelectCategory(
            ty.parse().ok()?,
            cat.parse().ok()?,
        ));
    }
    None
}

#[derive(Debug, Clone, Copy)]
struct ListSelection(usize);

fn filter_selection(msg: Message) -> Option<ListSelection> {
    parse_selection(msg.text()?).map(ListSelection)
}

/// A message consisting of digits only is a list selection. Numbers too big
/// for `usize` saturate, which the bounds check below rejects like any other
/// out-of-range input.
fn parse_selection(text: &str) -> Option<usize> {
    let text = text.trim();
    if text.is_empty() || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(text.parse().unwrap_or(usize::MAX))
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
        CallbackData::BackToMain => {
            back_to_main(&bot, &env, chat_id, user_id).await;
            Ok(())
        }
        CallbackData::SelectType(ty) => {
            select_type(&bot, &env, chat_id, user_id, ty).await;
            Ok(())
        }
        CallbackData::SelectCategory(ty, cat) => {
            select_category(&bot, &env, chat_id, user_id, ty, cat).await
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

async fn back_to_main(bot: &Bot, env: &BotEnv, chat_id: ChatId, user_id: UserId) {
    env.sessions.update(user_id, |s| {
        s.events = None;
        s.private = None;
    });
    reply::send_main_menu(bot, env, chat_id, user_id).await;
}

async fn select_type(
    bot: &Bot,
    env: &BotEnv,
    chat_id: ChatId,
    user_id: UserId,
    event_type: EventType,
) {
    reply::send_screen(
        bot,
        env,
        chat_id,
        user_id,
        format!("Choose a category for {event_type} events:"),
        Some(keyboards::categories(event_type)),
    )
    .await;
}

async fn select_category(
    bot: &Bot,
    env: &BotEnv,
    chat_id: ChatId,
    user_id: UserId,
    event_type: EventType,
    category: Category,
) -> Result<()> {
    let events = env.cached_events(event_type, category)?;
    let attending =
        store::attending_event_ids(&mut env.conn(), user_id.into())?;
    let available: Vec<Event> = events
        .iter()
        .filter(|e| !attending.contains(&e.id))
        .cloned()
        .collect();

    if available.is_empty() {
        reply::send_screen(
            bot,
            env,
            chat_id,
            user_id,
            "No upcoming events in this category yet.",
            Some(keyboards::back_to_main()),
        )
        .await;
        return Ok(());
    }

    let mut text =
        format!("Upcoming {category} events ({event_type}):\n\n");
    for (index, event) in available.iter().enumerate() {
        common::write_event_list_item(&mut text, index + 1, event);
    }
    text.push_str("Send an event number to see the details.");
    env.sessions.update(user_id, |s| s.events = Some(available));
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

async fn handle_selection(
    bot: Bot,
    env: Arc<BotEnv>,
    msg: Message,
    selection: ListSelection,
) -> Result<()> {
    let Some(user) = msg.from() else { return Ok(()) };
    let user_id = user.id;
    if let Err(e) =
        show_selected_event(&bot, &env, msg.chat.id, user_id, selection.0)
            .await
    {
        reply::report_step_error(
            &bot,
            &env,
            msg.chat.id,
            user_id,
            msg.text().unwrap_or_default(),
            &e,
        )
        .await;
    }
    Ok(())
}

async fn show_selected_event(
    bot: &Bot,
    env: &BotEnv,
    chat_id: ChatId,
    user_id: UserId,
    number: usize,
) -> Result<()> {
    let Some(events) = env.sessions.get(user_id).and_then(|s| s.events)
    else {
        reply::send_screen(
            bot,
            env,
            chat_id,
            user_id,
            "Please pick an event list from the menu first.",
            Some(keyboards::back_to_main()),
        )
        .await;
        return Ok(());
    };

    let Some(event) = pick(&events, number) else {
        reply::send_screen(
            bot,
            env,
            chat_id,
            user_id,
            format!("Please send a number from 1 to {}.", events.len()),
            None,
        )
        .await;
        return Ok(());
    };

    let attendance =
        store::find_attendance(&mut env.conn(), user_id.into(), event.id)?;
    reply::send_screen(
        bot,
        env,
        chat_id,
        user_id,
        common::format_event_details(event),
        Some(detail_markup(attendance.is_some(), event.id)),
    )
    .await;
    Ok(())
}

/// Resolve a 1-based selection against the stored listing.
fn pick(events: &[Event], number: usize) -> Option<&Event> {
    (1..=events.len()).contains(&number).then(|| &events[number - 1])
}

fn detail_markup(attending: bool, event_id: i32) -> InlineKeyboardMarkup {
    if attending {
        keyboards::attended_actions(event_id)
    } else {
        keyboards::rsvp(event_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboards::callback_data;

    fn event(id: i32) -> Event {
        let now = chrono::Utc::now().naive_utc();
        Event {
            id,
            name: format!("event {id}"),
            location: "Loft".to_string(),
            address: "Main st. 1".to_string(),
            event_type: EventType::Offline,
            category: Category::Concert,
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
        assert_eq!(parse_callback("b"), Some(CallbackData::BackToMain));
        assert_eq!(
            parse_callback("t:offline"),
            Some(CallbackData::SelectType(EventType::Offline))
        );
        assert_eq!(
            parse_callback("c:online:concert"),
            Some(CallbackData::SelectCategory(
                EventType::Online,
                Category::Concert
            ))
        );
        assert_eq!(parse_callback("t:sideways"), None);
        assert_eq!(parse_callback("c:online"), None);
        assert_eq!(parse_callback("g:1"), None);
    }

    #[test]
    fn selection_requires_digits_only() {
        assert_eq!(parse_selection("2"), Some(2));
        assert_eq!(parse_selection(" 007 "), Some(7));
        assert_eq!(parse_selection("0"), Some(0));
        assert_eq!(parse_selection("+5"), None);
        assert_eq!(parse_selection("two"), None);
        assert_eq!(parse_selection(""), None);
        // Absurdly long numbers stay numeric and fail the bounds check.
        assert_eq!(
            parse_selection("99999999999999999999999999"),
            Some(usize::MAX)
        );
    }

    #[test]
    fn pick_enforces_one_based_bounds() {
        let events = [event(1), event(2), event(3)];
        assert!(pick(&events, 0).is_none());
        assert_eq!(pick(&events, 1).map(|e| e.id), Some(1));
        assert_eq!(pick(&events, 3).map(|e| e.id), Some(3));
        assert!(pick(&events, 4).is_none());
        assert!(pick(&[], 1).is_none());
    }

    #[test]
    fn detail_markup_depends_on_attendance() {
        assert_eq!(callback_data(&detail_markup(false, 9)), ["g:9", "b"]);
        assert_eq!(
            callback_data(&detail_markup(true, 9)),
            ["e:going:9", "e:delete:9", "x:9", "m"]
        );
    }

    #[test]
    fn keyboards_round_trip_through_the_parser() {
        for data in callback_data(&keyboards::main_menu()) {
            if data == "m" || data == "p" {
                continue;
            }
            assert!(parse_callback(data).is_some(), "unparsed: {data}");
        }
        for data in callback_data(&keyboards::categories(EventType::Hybrid)) {
            assert!(parse_callback(data).is_some(), "unparsed: {data}");
        }
    }
}
