//! In-memory cache of event listings. Entries expire after a fixed lifetime
//! and are invalidated explicitly when the underlying data changes:
//! attendance mutations in the dialogue clear the affected user buckets, and
//! [`EventCache::invalidate`] is the notification hook for whatever mutates
//! event rows.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::db::DbUserId;
use crate::models::{AttendanceStatus, Category, Event, EventType};

pub const CACHE_LIFETIME: Duration = Duration::from_secs(5 * 60);

struct Entry {
    events: Arc<Vec<Event>>,
    fetched_at: Instant,
}

impl Entry {
    fn new(events: Arc<Vec<Event>>) -> Self {
        Self { events, fetched_at: Instant::now() }
    }

    fn expired(&self, lifetime: Duration) -> bool {
        self.fetched_at.elapsed() >= lifetime
    }
}

pub struct EventCache {
    listings: Mutex<HashMap<(EventType, Category), Entry>>,
    user_listings: Mutex<HashMap<(DbUserId, AttendanceStatus), Entry>>,
    lifetime: Duration,
}

impl EventCache {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            listings: Mutex::new(HashMap::new()),
            user_listings: Mutex::new(HashMap::new()),
            lifetime,
        }
    }

    /// Upcoming events of the given type and category. A live entry is
    /// returned as-is; otherwise `fetch` is invoked and its result stored.
    /// The map mutex is held across `fetch`, so concurrent misses on a key
    /// perform a single backing query.
    pub fn list_events<E>(
        &self,
        event_type: EventType,
        category: Category,
        fetch: impl FnOnce() -> Result<Vec<Event>, E>,
    ) -> Result<Arc<Vec<Event>>, E> {
        let mut listings = self.listings.lock().unwrap();
        if let Some(entry) = listings.get(&(event_type, category)) {
            if !entry.expired(self.lifetime) {
                return Ok(Arc::clone(&entry.events));
            }
        }
        let events = Arc::new(fetch()?);
        listings
            .insert((event_type, category), Entry::new(Arc::clone(&events)));
        log::info!("updated event cache for {event_type}/{category}");
        Ok(events)
    }

    /// Upcoming events the user has RSVPed to with the given status.
    pub fn list_user_events<E>(
        &self,
        user_id: DbUserId,
        status: AttendanceStatus,
        fetch: impl FnOnce() -> Result<Vec<Event>, E>,
    ) -> Result<Arc<Vec<Event>>, E> {
        let mut listings = self.user_listings.lock().unwrap();
        if let Some(entry) = listings.get(&(user_id, status)) {
            if !entry.expired(self.lifetime) {
                return Ok(Arc::clone(&entry.events));
            }
        }
        let events = Arc::new(fetch()?);
        listings.insert((user_id, status), Entry::new(Arc::clone(&events)));
        log::info!("updated event cache for user {user_id:?} ({status})");
        Ok(events)
    }

    /// Drop one listing entry, or all of them when no key is given.
    pub fn invalidate(&self, key: Option<(EventType, Category)>) {
        let mut listings = self.listings.lock().unwrap();
        match key {
            Some(key) => {
                listings.remove(&key);
            }
            None => listings.clear(),
        }
        log::info!("event cache invalidated");
    }

    /// Drop one user entry, or all of them when no key is given.
    pub fn invalidate_user(&self, key: Option<(DbUserId, AttendanceStatus)>) {
        let mut listings = self.user_listings.lock().unwrap();
        match key {
            Some(key) => {
                listings.remove(&key);
            }
            None => listings.clear(),
        }
        log::info!("user event cache invalidated");
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::convert::Infallible;

    use teloxide::types::UserId;

    use super::*;

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

    fn counted<'a>(
        calls: &'a Cell<u32>,
        events: Vec<Event>,
    ) -> impl FnOnce() -> Result<Vec<Event>, Infallible> + 'a {
        move || {
            calls.set(calls.get() + 1);
            Ok(events)
        }
    }

    fn ids(events: &[Event]) -> Vec<i32> {
        events.iter().map(|e| e.id).collect()
    }

    #[test]
    fn hit_within_lifetime_skips_the_backing_fetch() {
        let cache = EventCache::new(Duration::from_secs(300));
        let calls = Cell::new(0);

        let first = cache
            .list_events(
                EventType::Offline,
                Category::Concert,
                counted(&calls, vec![event(1), event(2)]),
            )
            .unwrap();
        let second = cache
            .list_events(
                EventType::Offline,
                Category::Concert,
                counted(&calls, vec![]),
            )
            .unwrap();

        assert_eq!(calls.get(), 1);
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn distinct_keys_fetch_separately() {
        let cache = EventCache::new(Duration::from_secs(300));
        let calls = Cell::new(0);

        cache
            .list_events(
                EventType::Offline,
                Category::Concert,
                counted(&calls, vec![event(1)]),
            )
            .unwrap();
        cache
            .list_events(
                EventType::Online,
                Category::Concert,
                counted(&calls, vec![event(2)]),
            )
            .unwrap();

        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn expired_entry_is_refetched() {
        let cache = EventCache::new(Duration::ZERO);
        let calls = Cell::new(0);

        for _ in 0..2 {
            cache
                .list_events(
                    EventType::Offline,
                    Category::Concert,
                    counted(&calls, vec![event(1)]),
                )
                .unwrap();
        }

        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn invalidation_forces_a_fresh_fetch() {
        let cache = EventCache::new(Duration::from_secs(300));
        let calls = Cell::new(0);
        let key = (EventType::Offline, Category::Concert);

        cache
            .list_events(key.0, key.1, counted(&calls, vec![event(1)]))
            .unwrap();
        cache.invalidate(Some(key));
        let events = cache
            .list_events(key.0, key.1, counted(&calls, vec![event(2)]))
            .unwrap();

        assert_eq!(calls.get(), 2);
        assert_eq!(ids(&events), [2]);
    }

    #[test]
    fn invalidating_one_key_keeps_the_others() {
        let cache = EventCache::new(Duration::from_secs(300));
        let calls = Cell::new(0);

        cache
            .list_events(
                EventType::Offline,
                Category::Concert,
                counted(&calls, vec![event(1)]),
            )
            .unwrap();
        cache.invalidate(Some((EventType::Online, Category::Meeting)));
        cache
            .list_events(
                EventType::Offline,
                Category::Concert,
                counted(&calls, vec![]),
            )
            .unwrap();

        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn sweep_all_clears_every_user_bucket() {
        let cache = EventCache::new(Duration::from_secs(300));
        let calls = Cell::new(0);
        let user = DbUserId::from(UserId(7));

        cache
            .list_user_events(
                user,
                AttendanceStatus::Going,
                counted(&calls, vec![event(1)]),
            )
            .unwrap();
        cache.invalidate_user(None);
        cache
            .list_user_events(
                user,
                AttendanceStatus::Going,
                counted(&calls, vec![]),
            )
            .unwrap();

        assert_eq!(calls.get(), 2);
    }
}
