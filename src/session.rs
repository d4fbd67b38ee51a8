//! Session store shared by every request thread

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Session id to user name map behind a single lock.
///
/// Build one per server and hand it out as `Arc<SessionStore>`.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, String>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    // A panicked writer cannot leave the map half-updated, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn save(&self, sid: &str, user: &str) {
        debug!(sid, user, "session saved");
        self.lock().insert(sid.to_string(), user.to_string());
    }

    /// User for `sid`, or an empty string when there is none.
    pub fn get(&self, sid: &str) -> String {
        self.lock().get(sid).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_save_and_get() {
        let store = SessionStore::new();
        assert_eq!(store.get("abc"), "");
        store.save("abc", "eve");
        assert_eq!(store.get("abc"), "eve");
        store.save("abc", "mallory");
        assert_eq!(store.get("abc"), "mallory");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_concurrent_writers() {
        let store = Arc::new(SessionStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for j in 0..50 {
                        store.save(&format!("{}-{}", i, j), "user");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 400);
    }
}
