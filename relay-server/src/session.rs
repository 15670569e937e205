//! In-memory chat session store.
//!
//! Maps a caller-supplied user id to that user's [`ChatTranscript`]. Each
//! transcript sits behind its own async mutex so a whole chat turn (read the
//! history, call the provider, append user + assistant messages) runs as one
//! exclusive scope per user, while different users proceed in parallel.
//!
//! The store is bounded: least-recently-used sessions are evicted once
//! `max_users` is reached, idle sessions expire after `idle_ttl`, and each
//! transcript keeps at most `max_messages` (oldest dropped first).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use relay_providers::{ChatMessage, Role};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::{debug, info};

/// Bounds applied by [`SessionStore`]. A `0` / `None` disables that bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub max_users: usize,
    pub idle_ttl: Option<Duration>,
    pub max_messages: usize,
}

impl SessionLimits {
    pub const UNBOUNDED: SessionLimits = SessionLimits {
        max_users: 0,
        idle_ttl: None,
        max_messages: 0,
    };
}

/// Ordered, append-only message history of one user.
#[derive(Debug, Clone, Default)]
pub struct ChatTranscript {
    messages: Vec<ChatMessage>,
    max_messages: usize,
}

impl ChatTranscript {
    fn with_cap(max_messages: usize) -> Self {
        Self {
            messages: Vec::new(),
            max_messages,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn clear(&mut self) {
        self.messages.clear();
    }

    /// Append `message`, trimming the oldest entries past the cap.
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
        if self.max_messages > 0 && self.messages.len() > self.max_messages {
            let overflow = self.messages.len() - self.max_messages;
            self.messages.drain(..overflow);
        }
    }
}

/// Exclusive access to one user's transcript.
pub type TranscriptGuard = OwnedMutexGuard<ChatTranscript>;

struct Entry {
    transcript: Arc<AsyncMutex<ChatTranscript>>,
    last_access: Instant,
}

impl Entry {
    /// A request holds or waits on this transcript; the map owns one handle.
    fn is_busy(&self) -> bool {
        Arc::strong_count(&self.transcript) > 1
    }

    fn is_expired(&self, ttl: Option<Duration>, now: Instant) -> bool {
        !self.is_busy() && ttl.is_some_and(|ttl| now.duration_since(self.last_access) >= ttl)
    }
}

/// Process-wide user id → transcript map.
pub struct SessionStore {
    entries: Mutex<HashMap<String, Entry>>,
    limits: SessionLimits,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionStore({} sessions, {:?})", self.len(), self.limits)
    }
}

impl SessionStore {
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            limits,
        }
    }

    /// Lock `user_id`'s transcript, creating an empty one if needed.
    ///
    /// The guard is held for the whole chat turn; a second request for the
    /// same user waits here until the first one finishes.
    pub async fn lock(&self, user_id: &str) -> TranscriptGuard {
        self.slot(user_id).lock_owned().await
    }

    /// Append a single message to `user_id`'s transcript.
    pub async fn append(&self, user_id: &str, role: Role, content: impl Into<String>) {
        self.lock(user_id)
            .await
            .push(ChatMessage::new(role, content));
    }

    /// Snapshot of `user_id`'s transcript (an unknown id yields an empty one).
    pub async fn get(&self, user_id: &str) -> Vec<ChatMessage> {
        self.lock(user_id).await.messages().to_vec()
    }

    /// Snapshot of `user_id`'s transcript without creating or touching it.
    ///
    /// Waits for an in-flight chat turn of that user to finish, so the
    /// snapshot never shows a half-committed turn. The wait lasts as long as
    /// the provider call, which `RELAY_PROVIDER_TIMEOUT_SECS` bounds when set.
    pub async fn peek(&self, user_id: &str) -> Vec<ChatMessage> {
        let Some(slot) = self.existing(user_id) else {
            return Vec::new();
        };
        if let Ok(transcript) = slot.try_lock() {
            return transcript.messages().to_vec();
        }
        debug!(user_id, "transcript busy; waiting for the current turn");
        slot.lock().await.messages().to_vec()
    }

    /// Empty `user_id`'s transcript. Returns `true` if one existed.
    ///
    /// An in-flight turn for the same user finishes first; its messages are
    /// cleared along with the rest. The entry itself is only dropped when no
    /// other request holds or waits on it.
    pub async fn clear(&self, user_id: &str) -> bool {
        let Some(slot) = self.existing(user_id) else {
            return false;
        };
        Arc::clone(&slot).lock_owned().await.clear();

        let mut entries = self.entries();
        let idle = entries
            .get(user_id)
            .is_some_and(|e| Arc::ptr_eq(&e.transcript, &slot) && Arc::strong_count(&slot) == 2);
        if idle {
            entries.remove(user_id);
        }
        info!(user_id, "session cleared");
        true
    }

    /// Number of tracked users.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every session idle for longer than the TTL; returns how many.
    pub fn evict_expired(&self) -> usize {
        let mut entries = self.entries();
        Self::evict_expired_locked(&mut entries, self.limits.idle_ttl, Instant::now())
    }

    fn slot(&self, user_id: &str) -> Arc<AsyncMutex<ChatTranscript>> {
        let now = Instant::now();
        let mut entries = self.entries();

        if let Some(entry) = entries.get_mut(user_id) {
            if !entry.is_expired(self.limits.idle_ttl, now) {
                entry.last_access = now;
                return Arc::clone(&entry.transcript);
            }
            debug!(user_id, "session expired; starting a fresh transcript");
            entries.remove(user_id);
        }

        if self.limits.max_users > 0 && entries.len() >= self.limits.max_users {
            Self::evict_expired_locked(&mut entries, self.limits.idle_ttl, now);
        }
        if self.limits.max_users > 0 && entries.len() >= self.limits.max_users {
            let oldest = entries
                .iter()
                .filter(|(_, e)| !e.is_busy())
                .min_by_key(|(_, e)| e.last_access)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(oldest) => {
                    info!(evicted = %oldest, "evicting least-recently-used session");
                    entries.remove(&oldest);
                }
                None => debug!(
                    sessions = entries.len(),
                    "every session is in use; exceeding the user cap"
                ),
            }
        }

        let transcript = Arc::new(AsyncMutex::new(ChatTranscript::with_cap(
            self.limits.max_messages,
        )));
        entries.insert(
            user_id.to_owned(),
            Entry {
                transcript: Arc::clone(&transcript),
                last_access: now,
            },
        );
        transcript
    }

    /// Live transcript of `user_id`, if any; never inserts.
    fn existing(&self, user_id: &str) -> Option<Arc<AsyncMutex<ChatTranscript>>> {
        let now = Instant::now();
        self.entries()
            .get(user_id)
            .filter(|e| !e.is_expired(self.limits.idle_ttl, now))
            .map(|e| Arc::clone(&e.transcript))
    }

    fn evict_expired_locked(
        entries: &mut HashMap<String, Entry>,
        ttl: Option<Duration>,
        now: Instant,
    ) -> usize {
        if ttl.is_none() {
            return 0;
        }
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(ttl, now));
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, "expired idle sessions");
        }
        evicted
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::timeout;
    use tracing_test::traced_test;

    use super::*;

    fn limits(max_users: usize, ttl_secs: u64, max_messages: usize) -> SessionLimits {
        SessionLimits {
            max_users,
            idle_ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
            max_messages,
        }
    }

    #[tokio::test]
    async fn unknown_user_gets_empty_transcript() {
        let store = SessionStore::new(SessionLimits::UNBOUNDED);
        assert!(store.get("nobody").await.is_empty());
        assert_eq!(store.len(), 1, "lookup lazily creates the transcript");
    }

    #[tokio::test]
    async fn append_preserves_order_per_user() {
        let store = SessionStore::new(SessionLimits::UNBOUNDED);
        store.append("alice", Role::User, "one").await;
        store.append("bob", Role::User, "other").await;
        store.append("alice", Role::Assistant, "two").await;
        store.append("alice", Role::User, "three").await;

        let alice = store.get("alice").await;
        let contents: Vec<_> = alice.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["one", "two", "three"]);
        assert_eq!(alice[1].role, Role::Assistant);
        assert_eq!(store.get("bob").await.len(), 1);
    }

    #[tokio::test]
    async fn transcript_cap_drops_oldest_first() {
        let store = SessionStore::new(limits(0, 0, 3));
        for i in 0..5 {
            store.append("u", Role::User, format!("m{i}")).await;
        }
        let contents: Vec<_> = store
            .get("u")
            .await
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, ["m2", "m3", "m4"]);
    }

    #[tokio::test]
    #[traced_test]
    async fn least_recently_used_session_is_evicted_at_capacity() {
        let store = SessionStore::new(limits(2, 0, 0));
        store.append("a", Role::User, "hi").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.append("b", Role::User, "hi").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        // Touch "a" so "b" becomes the least recently used.
        store.append("a", Role::User, "again").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.append("c", Role::User, "hi").await;

        assert_eq!(store.len(), 2);
        assert_eq!(store.get("a").await.len(), 2);
        assert_eq!(store.len(), 2);
        assert!(logs_contain("evicting least-recently-used session"));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_expire() {
        let store = SessionStore::new(limits(0, 60, 0));
        store.append("idle", Role::User, "hello").await;
        store.append("busy", Role::User, "hello").await;

        tokio::time::advance(Duration::from_secs(45)).await;
        store.append("busy", Role::User, "still here").await;

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(store.evict_expired(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("busy").await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_session_restarts_on_access() {
        let store = SessionStore::new(limits(0, 10, 0));
        store.append("u", Role::User, "old").await;
        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(store.get("u").await.is_empty());
    }

    #[tokio::test]
    async fn clear_removes_transcript() {
        let store = SessionStore::new(SessionLimits::UNBOUNDED);
        store.append("u", Role::User, "x").await;
        assert!(store.clear("u").await);
        assert!(!store.clear("u").await);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn clear_waits_for_in_flight_turn() {
        let store = Arc::new(SessionStore::new(SessionLimits::UNBOUNDED));
        let mut turn = store.lock("u").await;

        let clearing = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.clear("u").await })
        };
        tokio::task::yield_now().await;
        assert!(!clearing.is_finished());

        // The lock must still be exclusive while the clear is pending.
        let contender = timeout(Duration::from_millis(50), store.lock("u")).await;
        assert!(contender.is_err(), "second lock acquired while the turn is running");

        turn.push(ChatMessage::user("q"));
        turn.push(ChatMessage::assistant("a"));
        drop(turn);

        assert!(clearing.await.unwrap());
        assert!(store.peek("u").await.is_empty());
    }

    #[tokio::test]
    async fn clear_keeps_entry_a_waiter_is_queued_on() {
        let store = Arc::new(SessionStore::new(SessionLimits::UNBOUNDED));
        let first = store.lock("u").await;

        let clearing = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.clear("u").await })
        };
        tokio::task::yield_now().await;
        let next_turn = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let mut guard = store.lock("u").await;
                guard.push(ChatMessage::user("after clear"));
            })
        };
        tokio::task::yield_now().await;
        drop(first);

        assert!(clearing.await.unwrap());
        next_turn.await.unwrap();
        assert_eq!(store.len(), 1);
        let contents: Vec<_> = store.peek("u").await.into_iter().map(|m| m.content).collect();
        assert_eq!(contents, ["after clear"]);
    }

    #[tokio::test]
    async fn locked_session_is_never_evicted() {
        let store = SessionStore::new(limits(1, 0, 0));
        let mut turn = store.lock("a").await;

        store.append("b", Role::User, "hi").await;
        assert_eq!(store.len(), 2, "busy session kept past the cap");

        let contender = timeout(Duration::from_millis(50), store.lock("a")).await;
        assert!(contender.is_err(), "second lock on a acquired while first held");

        turn.push(ChatMessage::user("q"));
        turn.push(ChatMessage::assistant("a"));
        drop(turn);
        assert_eq!(store.peek("a").await.len(), 2);

        // Once idle, the cap applies again.
        store.append("c", Role::User, "hi").await;
        assert_eq!(store.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn locked_session_does_not_expire() {
        let store = SessionStore::new(limits(0, 10, 0));
        let turn = store.lock("u").await;
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(store.evict_expired(), 0);
        drop(turn);
        assert_eq!(store.evict_expired(), 1);
    }

    #[tokio::test]
    async fn peek_does_not_create_sessions() {
        let store = SessionStore::new(limits(1, 0, 0));
        store.append("real", Role::User, "keep me").await;

        for i in 0..5 {
            assert!(store.peek(&format!("stranger-{i}")).await.is_empty());
        }
        assert_eq!(store.len(), 1);
        assert_eq!(store.peek("real").await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn peek_hides_expired_transcripts() {
        let store = SessionStore::new(limits(0, 10, 0));
        store.append("u", Role::User, "old").await;
        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(store.peek("u").await.is_empty());
        assert!(!store.clear("u").await);
    }

    #[tokio::test]
    async fn peek_waits_for_the_current_turn() {
        let store = Arc::new(SessionStore::new(SessionLimits::UNBOUNDED));
        let mut turn = store.lock("u").await;

        let reader = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.peek("u").await })
        };
        tokio::task::yield_now().await;
        turn.push(ChatMessage::user("q"));
        turn.push(ChatMessage::assistant("a"));
        drop(turn);

        assert_eq!(reader.await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn lock_serializes_turns_for_the_same_user() {
        let store = Arc::new(SessionStore::new(SessionLimits::UNBOUNDED));

        let mut first = store.lock("u").await;
        let contender = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                let mut guard = store.lock("u").await;
                guard.push(ChatMessage::user("second"));
            })
        };

        tokio::task::yield_now().await;
        first.push(ChatMessage::user("first"));
        tokio::task::yield_now().await;
        first.push(ChatMessage::assistant("reply to first"));
        drop(first);

        contender.await.unwrap();
        let contents: Vec<_> = store.get("u").await.into_iter().map(|m| m.content).collect();
        assert_eq!(contents, ["first", "reply to first", "second"]);
    }
}
