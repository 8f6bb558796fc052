//! Per-user navigation state. Sessions live in memory only: they hold the
//! last rendered event list (so a bare number in chat can select from it),
//! the in-flight private-channel browsing window, and the id of the last
//! message the bot sent to the user's chat.
//!
//! A session expires one hour after its last mutation. Expiry is checked
//! lazily on read and enforced by [`sweep_task`] on a fixed interval so
//! abandoned sessions do not accumulate.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use teloxide::types::{MessageId, UserId};
use tokio::select;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::common::BotEnv;
use crate::models::{Category, Event, EventType};

pub const SESSION_LIFETIME: Duration = Duration::from_secs(60 * 60);
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Clone, Debug, Default)]
pub struct Session {
    /// The last numbered event list shown to the user, in display order.
    pub events: Option<Vec<Event>>,
    /// Nested groupings of the private-channel branch.
    pub private: Option<PrivateBrowse>,
    /// The message to delete before sending the next screen.
    pub last_message_id: Option<MessageId>,
}

/// One private-channel browsing window. The listings are windowed per
/// session (they exclude events the user already attends), so they live
/// here rather than in the shared cache.
#[derive(Clone, Debug)]
pub struct PrivateBrowse {
    pub channel_id: i32,
    pub channel_name: String,
    pub by_type: HashMap<EventType, Vec<Event>>,
    pub by_category: Option<(EventType, HashMap<Category, Vec<Event>>)>,
}

struct Stored {
    session: Session,
    touched: Instant,
}

impl Stored {
    fn new() -> Self {
        Self { session: Session::default(), touched: Instant::now() }
    }

    fn expired(&self, lifetime: Duration) -> bool {
        self.touched.elapsed() >= lifetime
    }
}

pub struct SessionStore {
    inner: Mutex<HashMap<UserId, Stored>>,
    lifetime: Duration,
}

impl SessionStore {
    pub fn new(lifetime: Duration) -> Self {
        Self { inner: Mutex::new(HashMap::new()), lifetime }
    }

    /// A snapshot of the user's session. An entry past its lifetime is
    /// removed and reported absent.
    pub fn get(&self, user_id: UserId) -> Option<Session> {
        let mut inner = self.inner.lock().unwrap();
        match inner.entry(user_id) {
            Entry::Occupied(entry) if entry.get().expired(self.lifetime) => {
                entry.remove();
                None
            }
            Entry::Occupied(entry) => Some(entry.get().session.clone()),
            Entry::Vacant(_) => None,
        }
    }

    /// Mutate the user's session under the store lock, creating it first if
    /// absent or expired, and refresh its timestamp. Concurrent updates for
    /// one user serialize here, so a read-modify-write of a single field
    /// cannot lose writes made in between.
    pub fn update<T>(
        &self,
        user_id: UserId,
        f: impl FnOnce(&mut Session) -> T,
    ) -> T {
        let mut inner = self.inner.lock().unwrap();
        let stored = inner.entry(user_id).or_insert_with(Stored::new);
        if stored.expired(self.lifetime) {
            *stored = Stored::new();
        }
        stored.touched = Instant::now();
        f(&mut stored.session)
    }

    /// Drop every session past its lifetime. Uses the same expiry predicate
    /// as the lazy check in [`get`](Self::get).
    pub fn sweep(&self) {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.len();
        inner.retain(|_, stored| !stored.expired(self.lifetime));
        let removed = before - inner.len();
        if removed > 0 {
            log::info!("swept {removed} expired session(s)");
        }
    }

    #[cfg(test)]
    fn contains(&self, user_id: UserId) -> bool {
        self.inner.lock().unwrap().contains_key(&user_id)
    }
}

/// Periodically sweep expired sessions until shutdown.
pub async fn sweep_task(env: Arc<BotEnv>, shutdown: CancellationToken) {
    loop {
        select! {
            () = shutdown.cancelled() => break,
            () = sleep(SWEEP_INTERVAL) => {}
        }
        env.sessions.sweep();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER: UserId = UserId(1);

    #[test]
    fn updates_merge_into_one_session() {
        let store = SessionStore::new(Duration::from_secs(60));
        store.update(USER, |s| s.last_message_id = Some(MessageId(5)));
        store.update(USER, |s| s.events = Some(Vec::new()));

        let session = store.get(USER).unwrap();
        assert_eq!(session.last_message_id, Some(MessageId(5)));
        assert!(session.events.is_some());
    }

    #[test]
    fn clearing_one_field_preserves_the_rest() {
        let store = SessionStore::new(Duration::from_secs(60));
        store.update(USER, |s| {
            s.events = Some(Vec::new());
            s.last_message_id = Some(MessageId(5));
        });
        store.update(USER, |s| s.events = None);

        let session = store.get(USER).unwrap();
        assert!(session.events.is_none());
        assert_eq!(session.last_message_id, Some(MessageId(5)));
    }

    #[test]
    fn expired_session_is_absent_and_removed_on_read() {
        let store = SessionStore::new(Duration::ZERO);
        store.update(USER, |s| s.last_message_id = Some(MessageId(5)));

        assert!(store.get(USER).is_none());
        assert!(!store.contains(USER));
    }

    #[test]
    fn sweep_removes_expired_sessions_without_a_read() {
        let store = SessionStore::new(Duration::ZERO);
        store.update(USER, |s| s.last_message_id = Some(MessageId(5)));

        assert!(store.contains(USER));
        store.sweep();
        assert!(!store.contains(USER));
    }

    #[test]
    fn live_sessions_survive_the_sweep() {
        let store = SessionStore::new(Duration::from_secs(60));
        store.update(USER, |s| s.last_message_id = Some(MessageId(5)));

        store.sweep();
        assert!(store.contains(USER));
    }

    #[test]
    fn update_resets_an_expired_session() {
        let store = SessionStore::new(Duration::ZERO);
        store.update(USER, |s| s.last_message_id = Some(MessageId(5)));
        let seen =
            store.update(USER, |s| s.last_message_id);
        // The expired state is discarded before the closure runs.
        assert_eq!(seen, None);
    }
}
