//! In-memory chat histories keyed by session id

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::model::Turn;

/// Chat sessions. Lost on restart.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, Vec<Turn>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A poisoned lock only means another request panicked mid-update;
    /// the map itself is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Turn>>> {
        self.sessions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of a session's history (empty for a new session).
    pub fn history(&self, session_id: &str) -> Vec<Turn> {
        self.lock().get(session_id).cloned().unwrap_or_default()
    }

    pub fn store(&self, session_id: &str, history: Vec<Turn>) {
        self.lock().insert(session_id.to_string(), history);
    }

    /// Returns whether the session existed.
    pub fn clear(&self, session_id: &str) -> bool {
        self.lock().remove(session_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_are_independent() {
        let store = SessionStore::new();
        store.store("a", vec![Turn::user_text("hello")]);
        assert_eq!(store.history("a").len(), 1);
        assert!(store.history("b").is_empty());

        assert!(store.clear("a"));
        assert!(!store.clear("a"));
        assert!(store.history("a").is_empty());
    }
}
