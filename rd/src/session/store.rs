//! SessionStore - volatile per-reviewer conversation state
//!
//! The map lock is only held long enough to find or insert an entry. Each
//! session has its own async mutex so transitions for one reviewer are
//! serialized while different reviewers proceed independently.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::domain::{ReviewerIdentity, SessionState};

/// Exclusive access to one session
pub type SessionGuard = OwnedMutexGuard<SessionState>;

type SessionHandle = Arc<Mutex<SessionState>>;

/// Outcome of a non-waiting lock attempt
pub enum SessionLock {
    /// No session for the key
    Absent,
    /// A transition holds the session
    Busy,
    Idle(SessionGuard),
}

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, identity: &ReviewerIdentity, now: i64) -> SessionHandle {
        let key = identity.key();
        if let Some(handle) = self.sessions.read().unwrap_or_else(PoisonError::into_inner).get(&key) {
            return handle.clone();
        }
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions
            .entry(key)
            .or_insert_with(|| {
                debug!(reviewer = %identity, "handle: creating session");
                Arc::new(Mutex::new(SessionState::new(identity.clone(), now)))
            })
            .clone()
    }

    /// Existing or fresh session, locked, with `last_activity` refreshed
    pub async fn get(&self, identity: &ReviewerIdentity, now: i64) -> SessionGuard {
        let handle = self.handle(identity, now);
        let mut guard = handle.lock_owned().await;
        guard.last_activity = now;
        guard
    }

    /// Lock a session only if it exists and nobody is mid-transition on it
    pub fn try_get(&self, key: &str) -> Option<SessionGuard> {
        let handle = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()?;
        handle.try_lock_owned().ok()
    }

    /// Lock a session without waiting, telling a missing session from a busy one
    pub fn try_lock(&self, key: &str) -> SessionLock {
        let Some(handle) = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
        else {
            return SessionLock::Absent;
        };
        match handle.try_lock_owned() {
            Ok(guard) => SessionLock::Idle(guard),
            Err(_) => SessionLock::Busy,
        }
    }

    /// A session exists for `key` and a transition holds its lock
    pub fn is_busy(&self, key: &str) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .is_some_and(|handle| handle.try_lock().is_err())
    }

    pub fn remove(&self, key: &str) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    /// Copies of every idle session; sessions mid-transition are skipped
    pub fn all_active(&self) -> Vec<SessionState> {
        let handles: Vec<SessionHandle> = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        handles
            .iter()
            .filter_map(|handle| handle.try_lock().ok().map(|state| state.clone()))
            .collect()
    }

    /// Drop idle sessions untouched for longer than `max_idle_ms`
    pub fn expire_older_than(&self, max_idle_ms: i64, now: i64) -> usize {
        let cutoff = now - max_idle_ms;
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, handle| match handle.try_lock() {
            Ok(state) => state.last_activity >= cutoff,
            Err(_) => true,
        });
        let expired = before - sessions.len();
        if expired > 0 {
            debug!(expired, "expire_older_than: dropped idle sessions");
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Step;

    fn identity(name: &str) -> ReviewerIdentity {
        ReviewerIdentity::new(name, "010-0000-0000")
    }

    #[tokio::test]
    async fn test_get_creates_and_touches() {
        let store = SessionStore::new();
        {
            let guard = store.get(&identity("a"), 100).await;
            assert_eq!(guard.step, Step::Menu);
            assert_eq!(guard.last_activity, 100);
        }
        let guard = store.get(&identity("a"), 250).await;
        assert_eq!(guard.last_activity, 250);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_all_active_skips_locked_sessions() {
        let store = SessionStore::new();
        let held = store.get(&identity("busy"), 1).await;
        drop(store.get(&identity("idle"), 1).await);

        let snapshot = store.all_active();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].identity.name, "idle");
        assert!(store.try_get(&identity("busy").key()).is_none());
        assert!(store.is_busy(&identity("busy").key()));
        assert!(!store.is_busy(&identity("idle").key()));
        drop(held);
        assert!(store.try_get(&identity("busy").key()).is_some());
    }

    #[tokio::test]
    async fn test_try_lock_tells_absent_from_busy() {
        let store = SessionStore::new();
        let key = identity("a").key();
        assert!(matches!(store.try_lock(&key), SessionLock::Absent));

        let held = store.get(&identity("a"), 1).await;
        assert!(matches!(store.try_lock(&key), SessionLock::Busy));
        drop(held);

        let SessionLock::Idle(guard) = store.try_lock(&key) else {
            panic!("idle session should lock");
        };
        assert!(store.is_busy(&key));
        drop(guard);
        assert!(!store.is_busy(&key));
    }

    #[tokio::test]
    async fn test_snapshot_is_a_copy() {
        let store = SessionStore::new();
        drop(store.get(&identity("a"), 1).await);
        let snapshot = store.all_active();

        store.get(&identity("a"), 2).await.step = Step::Inquiry;

        assert_eq!(snapshot[0].step, Step::Menu);
        assert_eq!(store.all_active()[0].step, Step::Inquiry);
    }

    #[tokio::test]
    async fn test_expire_older_than() {
        let store = SessionStore::new();
        drop(store.get(&identity("old"), 1_000).await);
        drop(store.get(&identity("new"), 9_000).await);

        assert_eq!(store.expire_older_than(5_000, 10_000), 1);
        assert_eq!(store.len(), 1);
        assert!(store.try_get(&identity("new").key()).is_some());
        assert!(store.remove(&identity("new").key()));
        assert!(store.is_empty());
    }
}
