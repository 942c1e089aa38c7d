//! Abort intent for sessions that have no store entry yet.
//!
//! Process-lifetime only, never persisted.  Set by stop/abort when the
//! target has no entry; consumed when the entry is created; cleared by
//! reset and delete.  A flag whose entry never appears lapses after the
//! configured TTL and is dropped by the periodic sweep.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

pub struct AbortFlags {
    ttl: Duration,
    keys: Mutex<HashMap<String, Instant>>,
}

impl AbortFlags {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            keys: Mutex::new(HashMap::new()),
        }
    }

    /// Set (or refresh) the flag for `key`.
    pub fn set(&self, key: &str) {
        self.keys.lock().insert(key.to_owned(), Instant::now());
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.keys
            .lock()
            .get(key)
            .is_some_and(|at| at.elapsed() < self.ttl)
    }

    /// Remove the flag.  Returns whether it was set and still live.
    pub fn take(&self, key: &str) -> bool {
        self.keys
            .lock()
            .remove(key)
            .is_some_and(|at| at.elapsed() < self.ttl)
    }

    /// Drop lapsed flags.
    pub fn prune_expired(&self) -> usize {
        let mut keys = self.keys.lock();
        let before = keys.len();
        keys.retain(|_, at| at.elapsed() < self.ttl);
        before - keys.len()
    }

    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_consumes() {
        let flags = AbortFlags::new(Duration::from_secs(60));
        flags.set("k");
        assert!(flags.is_set("k"));
        assert!(flags.take("k"));
        assert!(!flags.take("k"));
        assert!(flags.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn lapsed_flags_are_pruned() {
        let flags = AbortFlags::new(Duration::from_secs(60));
        flags.set("old");
        tokio::time::advance(Duration::from_secs(45)).await;
        flags.set("new");
        tokio::time::advance(Duration::from_secs(20)).await;

        assert!(!flags.is_set("old"));
        assert!(flags.is_set("new"));
        assert_eq!(flags.prune_expired(), 1);
        assert_eq!(flags.len(), 1);
        assert!(flags.take("new"));
    }

    #[tokio::test(start_paused = true)]
    async fn setting_again_refreshes() {
        let flags = AbortFlags::new(Duration::from_secs(60));
        flags.set("k");
        tokio::time::advance(Duration::from_secs(50)).await;
        flags.set("k");
        tokio::time::advance(Duration::from_secs(50)).await;

        assert_eq!(flags.prune_expired(), 0);
        assert!(flags.take("k"));
    }
}
