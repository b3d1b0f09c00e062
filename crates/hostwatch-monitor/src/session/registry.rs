//! Concurrency-safe registry of live monitoring sessions.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::transport::Channel;

use super::types::SessionKey;

/// Slot states for a registered key.
enum SessionSlot {
    /// Key claimed, transport not yet open.
    Pending,
    /// Channel attached and reader running.
    Active { channel: Arc<dyn Channel> },
}

/// Registry enforcing at most one live session per [`SessionKey`].
///
/// `try_register` is the single linearization point: whichever caller inserts
/// first owns the key until it is unregistered. Critical sections never
/// suspend; transport and messaging work happens outside the lock.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionKey, SessionSlot>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Atomically claim `key`. Returns `false` when a session already holds it.
    pub async fn try_register(&self, key: &SessionKey) -> bool {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(key) {
            return false;
        }
        sessions.insert(key.clone(), SessionSlot::Pending);
        true
    }

    /// Attach the opened channel to a previously claimed key.
    pub async fn attach(&self, key: &SessionKey, channel: Arc<dyn Channel>) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(key.clone(), SessionSlot::Active { channel });
    }

    /// Channel handle of the active session for `key`, if any.
    pub async fn channel(&self, key: &SessionKey) -> Option<Arc<dyn Channel>> {
        let sessions = self.sessions.read().await;
        match sessions.get(key) {
            Some(SessionSlot::Active { channel }) => Some(Arc::clone(channel)),
            _ => None,
        }
    }

    /// Remove `key` unconditionally. Idempotent.
    pub async fn unregister(&self, key: &SessionKey) {
        let removed = self.sessions.write().await.remove(key).is_some();
        if removed {
            debug!(%key, "Session unregistered");
        }
    }

    /// Remove `key` only if it still holds `channel` (same allocation).
    ///
    /// Reader exit paths use this so a reader that was already replaced by a
    /// newer session for the same key cannot evict its successor. Returns
    /// whether removal happened.
    pub async fn unregister_if(&self, key: &SessionKey, channel: &Arc<dyn Channel>) -> bool {
        let mut sessions = self.sessions.write().await;
        if let Some(SessionSlot::Active { channel: current }) = sessions.get(key)
            && Arc::ptr_eq(current, channel)
        {
            sessions.remove(key);
            debug!(%key, "Session unregistered by its reader");
            return true;
        }
        false
    }

    /// Whether `key` is claimed (pending or active).
    pub async fn is_registered(&self, key: &SessionKey) -> bool {
        self.sessions.read().await.contains_key(key)
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Keys of all registered sessions.
    pub async fn keys(&self) -> Vec<SessionKey> {
        self.sessions.read().await.keys().cloned().collect()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
