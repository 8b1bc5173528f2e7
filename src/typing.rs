use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// Ephemeral typing presence. Entirely in-process: nothing here is persisted
/// or replayed, and a restart clears all state by construction.
///
/// Keys are (conversation, participant); a signal stays live for `ttl`
/// unless refreshed or explicitly cleared. Expired entries are evicted
/// lazily whenever the map is touched.
#[derive(Clone)]
pub struct TypingTracker {
    ttl: Duration,
    inner: Arc<RwLock<HashMap<(Uuid, Uuid), Instant>>>,
}

impl TypingTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn signal_typing(&self, conversation_id: Uuid, participant_id: Uuid) {
        let now = Instant::now();
        // The map holds only deadlines, so a poisoned lock is still valid.
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.retain(|_, deadline| *deadline > now);
        guard.insert((conversation_id, participant_id), now + self.ttl);
    }

    /// Called on send or on empty input; clears the signal immediately.
    pub fn signal_stopped(&self, conversation_id: Uuid, participant_id: Uuid) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.remove(&(conversation_id, participant_id));
    }

    /// Whether this participant currently has a live signal. Used to avoid
    /// broadcasting spurious stop events on disconnect.
    pub fn is_typing(&self, conversation_id: Uuid, participant_id: Uuid) -> bool {
        let now = Instant::now();
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .get(&(conversation_id, participant_id))
            .is_some_and(|deadline| *deadline > now)
    }

    /// Whether anyone other than `viewer` is composing in the conversation.
    /// A boolean, not a list; a missed signal just means no indicator.
    pub fn is_counterpart_typing(&self, conversation_id: Uuid, viewer: Uuid) -> bool {
        let now = Instant::now();
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.iter().any(|((conv, who), deadline)| {
            *conv == conversation_id && *who != viewer && *deadline > now
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, pause};

    #[tokio::test]
    async fn signal_is_visible_to_the_other_party_only() {
        let tracker = TypingTracker::new(Duration::from_secs(5));
        let conv = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        tracker.signal_typing(conv, alice);
        assert!(tracker.is_counterpart_typing(conv, bob));
        assert!(!tracker.is_counterpart_typing(conv, alice));
        assert!(!tracker.is_counterpart_typing(Uuid::new_v4(), bob));
    }

    #[tokio::test]
    async fn signal_expires_without_refresh() {
        pause();
        let tracker = TypingTracker::new(Duration::from_secs(5));
        let conv = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        tracker.signal_typing(conv, alice);
        advance(Duration::from_secs(4)).await;
        assert!(tracker.is_counterpart_typing(conv, bob));

        advance(Duration::from_secs(2)).await;
        assert!(!tracker.is_counterpart_typing(conv, bob));
    }

    #[tokio::test]
    async fn refresh_extends_the_window() {
        pause();
        let tracker = TypingTracker::new(Duration::from_secs(5));
        let conv = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        tracker.signal_typing(conv, alice);
        advance(Duration::from_secs(4)).await;
        tracker.signal_typing(conv, alice);
        advance(Duration::from_secs(4)).await;
        assert!(tracker.is_counterpart_typing(conv, bob));
    }

    #[tokio::test]
    async fn lock_poisoning_does_not_cascade() {
        let tracker = TypingTracker::new(Duration::from_secs(5));
        let conv = Uuid::new_v4();
        let alice = Uuid::new_v4();

        let poisoner = tracker.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.inner.write().unwrap();
            panic!("poison the typing map");
        })
        .join();

        tracker.signal_typing(conv, alice);
        assert!(tracker.is_typing(conv, alice));
        tracker.signal_stopped(conv, alice);
        assert!(!tracker.is_counterpart_typing(conv, Uuid::new_v4()));
    }

    #[tokio::test]
    async fn stop_clears_immediately() {
        let tracker = TypingTracker::new(Duration::from_secs(5));
        let conv = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        tracker.signal_typing(conv, alice);
        tracker.signal_stopped(conv, alice);
        assert!(!tracker.is_counterpart_typing(conv, bob));
    }
}
