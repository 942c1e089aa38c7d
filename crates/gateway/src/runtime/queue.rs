//! Follow-up queue: messages that arrived while a session was busy, plus the
//! per-session processing lanes that drain them.

use std::collections::{HashMap, HashSet, VecDeque};

use parking_lot::Mutex;

use super::collaborators::{QueueCanceller, QueueClearCounts};

#[derive(Default)]
pub struct FollowupQueue {
    followups: Mutex<HashMap<String, VecDeque<String>>>,
    lanes: Mutex<HashSet<String>>,
}

impl FollowupQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a follow-up message under `key` (session key or session id).
    pub fn enqueue(&self, key: &str, message: impl Into<String>) {
        self.followups
            .lock()
            .entry(key.to_owned())
            .or_default()
            .push_back(message.into());
    }

    /// Mark a processing lane open for `key`.
    pub fn open_lane(&self, key: &str) {
        self.lanes.lock().insert(key.to_owned());
    }

    pub fn close_lane(&self, key: &str) {
        self.lanes.lock().remove(key);
    }

    /// Take the next follow-up for `key`.
    pub fn pop(&self, key: &str) -> Option<String> {
        let mut followups = self.followups.lock();
        let queue = followups.get_mut(key)?;
        let next = queue.pop_front();
        if queue.is_empty() {
            followups.remove(key);
        }
        next
    }

    pub fn pending(&self, key: &str) -> usize {
        self.followups.lock().get(key).map_or(0, VecDeque::len)
    }
}

impl QueueCanceller for FollowupQueue {
    fn clear_queues(&self, keys: &[String]) -> QueueClearCounts {
        let mut counts = QueueClearCounts::default();
        {
            let mut followups = self.followups.lock();
            for key in keys {
                if let Some(q) = followups.remove(key) {
                    counts.followups += q.len();
                }
            }
        }
        {
            let mut lanes = self.lanes.lock();
            for key in keys {
                if lanes.remove(key) {
                    counts.lanes += 1;
                }
            }
        }
        if counts != QueueClearCounts::default() {
            tracing::debug!(
                followups = counts.followups,
                lanes = counts.lanes,
                "cleared queued work"
            );
        }
        counts
    }
}
