use std::collections::HashMap;
use std::sync::Mutex;

/// Process-wide access-token cache keyed by user id. Entries only live for
/// the duration of a run; contention is low, so one lock covers the map.
#[derive(Debug, Default)]
pub struct TokenCache {
    entries: Mutex<HashMap<String, String>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: &str) -> Option<String> {
        self.lock().get(user_id).cloned()
    }

    pub fn insert(&self, user_id: String, access_token: String) {
        self.lock().insert(user_id, access_token);
    }

    pub fn remove(&self, user_id: &str) {
        self.lock().remove(user_id);
    }

    // Entries are plain strings, so a write interrupted by a panic cannot
    // leave them inconsistent; a poisoned lock is safe to keep using.
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
