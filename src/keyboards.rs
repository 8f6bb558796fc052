//! Inline keyboard builders. Callback payloads use short prefixed forms
//! ("t:offline", "e:delete:7") that the module `filter_callbacks` functions
//! parse back into their `CallbackData` variants.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::models::{Category, EventType, TelegramChannel};

fn button(text: &str, data: String) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, data)
}

fn back_button() -> InlineKeyboardButton {
    button("🔙 Back", "b".to_string())
}

pub fn main_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([
        EventType::ALL
            .iter()
            .map(|ty| button(ty.label(), format!("t:{ty}")))
            .collect(),
        vec![
            button("📋 My events", "m".to_string()),
            button("🔒 Private", "p".to_string()),
        ],
    ])
}

pub fn categories(event_type: EventType) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(Category::ALL.chunks(2).map(|row| {
        row.iter()
            .map(|cat| button(cat.label(), format!("c:{event_type}:{cat}")))
            .collect::<Vec<_>>()
    }))
}

pub fn back_to_main() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([[back_button()]])
}

/// Detail-screen keyboard for an event the user is not attending yet.
pub fn rsvp(event_id: i32) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([
        vec![button("✅ I'm going", format!("g:{event_id}"))],
        vec![back_button()],
    ])
}

/// Detail-screen keyboard for an event the user already attends.
pub fn attended_actions(event_id: i32) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([
        vec![
            button("✅ Still going", format!("e:going:{event_id}")),
            button("🗑 Remove from my list", format!("e:delete:{event_id}")),
        ],
        vec![button("❌ Cancel attendance", format!("x:{event_id}"))],
        vec![button("🔙 Back", "m".to_string())],
    ])
}

pub fn my_categories(categories: &[Category]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        categories
            .iter()
            .map(|cat| vec![button(cat.label(), format!("mc:{cat}"))])
            .chain([vec![back_button()]]),
    )
}

pub fn channels(channels: &[TelegramChannel]) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        channels
            .iter()
            .map(|channel| {
                vec![button(&channel.name, format!("pc:{}", channel.id))]
            })
            .chain([vec![back_button()]]),
    )
}

pub fn private_types(
    channel_id: i32,
    types: &[EventType],
) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        types
            .iter()
            .map(|ty| {
                vec![button(ty.label(), format!("pt:{channel_id}:{ty}"))]
            })
            .chain([vec![back_button()]]),
    )
}

pub fn private_categories(
    channel_id: i32,
    event_type: EventType,
    categories: &[Category],
) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(
        categories
            .iter()
            .map(|cat| {
                vec![button(
                    cat.label(),
                    format!("px:{channel_id}:{event_type}:{cat}"),
                )]
            })
            .chain([vec![button(
                "🔙 Back",
                format!("pc:{channel_id}"),
            )]]),
    )
}

#[cfg(test)]
pub(crate) fn callback_data(markup: &InlineKeyboardMarkup) -> Vec<&str> {
    use teloxide::types::InlineKeyboardButtonKind;

    markup
        .inline_keyboard
        .iter()
        .flatten()
        .map(|b| match &b.kind {
            InlineKeyboardButtonKind::CallbackData(data) => data.as_str(),
            kind => panic!("unexpected button kind: {kind:?}"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_menu_covers_all_event_types() {
        assert_eq!(
            callback_data(&main_menu()),
            ["t:online", "t:offline", "t:hybrid", "m", "p"]
        );
    }

    #[test]
    fn category_rows_carry_the_selected_type() {
        assert_eq!(
            callback_data(&categories(EventType::Hybrid)),
            [
                "c:hybrid:concert",
                "c:hybrid:meeting",
                "c:hybrid:marathon",
                "c:hybrid:training"
            ]
        );
    }

    #[test]
    fn detail_keyboards_reference_the_event() {
        assert_eq!(callback_data(&rsvp(17)), ["g:17", "b"]);
        assert_eq!(
            callback_data(&attended_actions(17)),
            ["e:going:17", "e:delete:17", "x:17", "m"]
        );
    }

    #[test]
    fn private_keyboards_nest_the_selection() {
        assert_eq!(
            callback_data(&private_types(3, &[EventType::Online])),
            ["pt:3:online", "b"]
        );
        assert_eq!(
            callback_data(&private_categories(
                3,
                EventType::Online,
                &[Category::Meeting, Category::Training],
            )),
            ["px:3:online:meeting", "px:3:online:training", "pc:3"]
        );
    }
}
