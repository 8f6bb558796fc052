//! Shared bot state and message formatting helpers.

use std::fmt::Write;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Datelike, Weekday};
use diesel::{Connection, QueryResult, SqliteConnection};
use teloxide::utils::html::escape;

use crate::cache::EventCache;
use crate::config::Config;
use crate::db::DbUserId;
use crate::models::{AttendanceStatus, Category, Event, EventType};
use crate::session::SessionStore;
use crate::store;

/// Wrapper around [`teloxide::dispatching::UpdateHandler`] to be used in this
/// crate.
pub type UpdateHandler = teloxide::dispatching::UpdateHandler<anyhow::Error>;

/// Bot environment: global state shared between all handlers.
///
/// Lock order: the cache and session mutexes may be held across a `conn`
/// access (cache fill), so nothing may acquire them while holding the
/// connection guard.
pub struct BotEnv {
    pub conn: Mutex<SqliteConnection>,
    pub config: Arc<Config>,
    pub cache: EventCache,
    pub sessions: SessionStore,
}

impl BotEnv {
    pub fn conn(&self) -> MutexGuard<'_, SqliteConnection> {
        self.conn.lock().unwrap()
    }

    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&mut SqliteConnection) -> QueryResult<T>,
    ) -> QueryResult<T> {
        self.conn().exclusive_transaction(f)
    }

    /// Cached listing of upcoming events for a type and category.
    pub fn cached_events(
        &self,
        event_type: EventType,
        category: Category,
    ) -> QueryResult<Arc<Vec<Event>>> {
        self.cache.list_events(event_type, category, || {
            store::upcoming_events(&mut self.conn(), event_type, category)
        })
    }

    /// Cached listing of the user's upcoming RSVPed events.
    pub fn cached_user_events(
        &self,
        user_id: DbUserId,
        status: AttendanceStatus,
    ) -> QueryResult<Arc<Vec<Event>>> {
        self.cache.list_user_events(user_id, status, || {
            store::upcoming_user_events(&mut self.conn(), user_id, status)
        })
    }
}

/// Append one entry of a numbered event list.
pub fn write_event_list_item(out: &mut String, index: usize, event: &Event) {
    writeln!(out, "{index}. {}", escape(&event.name)).unwrap();
    writeln!(out, "   📅 {}", event.date_time.format("%d.%m.%Y %H:%M"))
        .unwrap();
    writeln!(out, "   📍 {}", escape(&event.location)).unwrap();
    if !event.address.is_empty() {
        writeln!(out, "   🏠 {}", escape(&event.address)).unwrap();
    }
    if let Some(link) = &event.map_link {
        writeln!(out, "   🗺 {}", escape(link)).unwrap();
    }
    out.push('\n');
}

/// Append one entry of a compact numbered list, as used for private
/// channels. Weekend dates get a bold day marker.
pub fn write_compact_event_item(out: &mut String, index: usize, event: &Event) {
    write!(out, "{index}. {}", event.date_time.format("%d.%m (%H:%M)"))
        .unwrap();
    match event.date_time.weekday() {
        Weekday::Sat => out.push_str(" <b>Sat</b>"),
        Weekday::Sun => out.push_str(" <b>Sun</b>"),
        _ => {}
    }
    writeln!(out, " - {}", escape(&event.name)).unwrap();
}

/// The detail screen of a single event.
pub fn format_event_details(event: &Event) -> String {
    let mut text = format!("<b>{}</b>\n", escape(&event.name));
    writeln!(
        text,
        "📍 {}, {}",
        escape(&event.location),
        escape(&event.address)
    )
    .unwrap();
    writeln!(text, "📅 {}", event.date_time.format("%d.%m.%Y %H:%M"))
        .unwrap();
    if let Some(details) = &event.details {
        writeln!(text, "📝 {}", escape(details)).unwrap();
    }
    if let Some(link) = &event.map_link {
        write!(text, "🔗 <a href=\"{link}\">Open the map</a>").unwrap();
    }
    text
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn event() -> Event {
        Event {
            id: 1,
            name: "Night <of> jazz".to_string(),
            location: "Loft".to_string(),
            address: "Main st. 1".to_string(),
            event_type: EventType::Offline,
            category: Category::Concert,
            // A Saturday.
            date_time: NaiveDate::from_ymd_opt(2025, 3, 1)
                .unwrap()
                .and_hms_opt(19, 30, 0)
                .unwrap(),
            details: Some("Bring friends".to_string()),
            map_link: Some("https://example.com/map".to_string()),
            is_private: false,
            channel_id: None,
            created_at: NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn list_item_escapes_and_includes_optional_fields() {
        let mut out = String::new();
        write_event_list_item(&mut out, 2, &event());
        assert_eq!(
            out,
            "2. Night &lt;of&gt; jazz\n\
             \u{20}  📅 01.03.2025 19:30\n\
             \u{20}  📍 Loft\n\
             \u{20}  🏠 Main st. 1\n\
             \u{20}  🗺 https://example.com/map\n\n"
        );
    }

    #[test]
    fn compact_item_marks_weekends() {
        let mut out = String::new();
        write_compact_event_item(&mut out, 1, &event());
        assert_eq!(out, "1. 01.03 (19:30) <b>Sat</b> - Night &lt;of&gt; jazz\n");
    }

    #[test]
    fn details_screen_renders_every_field() {
        let text = format_event_details(&event());
        assert!(text.starts_with("<b>Night &lt;of&gt; jazz</b>\n"));
        assert!(text.contains("📍 Loft, Main st. 1"));
        assert!(text.contains("📅 01.03.2025 19:30"));
        assert!(text.contains("📝 Bring friends"));
        assert!(text.contains("<a href=\"https://example.com/map\">"));
    }
}
