//! Lifecycle hook fan-out.
//!
//! Events are logged and broadcast to subscribers.  Delivery never blocks
//! and a lagging or absent subscriber is not an error.

use tokio::sync::broadcast;

use super::collaborators::{HookEvent, HookNotifier};

pub struct HookBus {
    tx: broadcast::Sender<HookEvent>,
}

impl Default for HookBus {
    fn default() -> Self {
        Self::new()
    }
}

impl HookBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HookEvent> {
        self.tx.subscribe()
    }
}

impl HookNotifier for HookBus {
    fn notify(&self, event: HookEvent) {
        tracing::info!(
            hook = ?event.kind,
            session_key = %event.session_key,
            session_id = ?event.session_id,
            "lifecycle hook"
        );
        let _ = self.tx.send(event);
    }
}
