//! Sub-agents spawned on behalf of a session.
//!
//! A requester session owns a group of children.  Stopping the requester's
//! dependents cancels every child in its group.

use std::collections::HashMap;

use parking_lot::Mutex;
use uuid::Uuid;

use super::collaborators::SubprocessStopper;
use super::runs::CancelToken;

struct Child {
    id: Uuid,
    token: CancelToken,
}

/// requester key → children.
#[derive(Default)]
pub struct SubagentRegistry {
    groups: Mutex<HashMap<String, Vec<Child>>>,
}

impl SubagentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a child started by `requester_key`.  The returned token is
    /// cancelled when the requester's dependents are stopped.
    pub fn spawn_for(&self, requester_key: &str) -> (Uuid, CancelToken) {
        let id = Uuid::new_v4();
        let token = CancelToken::new();
        self.groups
            .lock()
            .entry(requester_key.to_owned())
            .or_default()
            .push(Child {
                id,
                token: token.clone(),
            });
        (id, token)
    }

    /// Forget a child that finished on its own.
    pub fn finish(&self, requester_key: &str, id: Uuid) {
        let mut groups = self.groups.lock();
        if let Some(children) = groups.get_mut(requester_key) {
            children.retain(|c| c.id != id);
            if children.is_empty() {
                groups.remove(requester_key);
            }
        }
    }

    pub fn count(&self, requester_key: &str) -> usize {
        self.groups.lock().get(requester_key).map_or(0, Vec::len)
    }
}

impl SubprocessStopper for SubagentRegistry {
    fn stop_dependents(&self, requester_key: &str) -> usize {
        let Some(children) = self.groups.lock().remove(requester_key) else {
            return 0;
        };
        for child in &children {
            child.token.cancel();
        }
        tracing::info!(
            requester_key,
            stopped = children.len(),
            "stopped sub-agents"
        );
        children.len()
    }
}
