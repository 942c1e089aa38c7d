//! Contracts the lifecycle orchestrator consumes from the rest of the agent.
//!
//! The gateway ships in-process implementations of each
//! ([`RunRegistry`](super::runs::RunRegistry),
//! [`FollowupQueue`](super::queue::FollowupQueue),
//! [`SubagentRegistry`](super::subagents::SubagentRegistry),
//! [`HookBus`](super::hooks::HookBus)); an embedding agent can swap in its
//! own through [`Collaborators`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Live agent executions, addressed by session id.
#[async_trait]
pub trait RunController: Send + Sync {
    /// Whether a run is in flight for this session id.
    fn is_active(&self, session_id: &str) -> bool;

    /// Signal the run to stop.  Returns `true` if a run was found.
    fn abort(&self, session_id: &str) -> bool;

    /// Wait until the run has ended.  Returns `false` on timeout.  A session
    /// with no run counts as ended.
    async fn wait_for_end(&self, session_id: &str, timeout: Duration) -> bool;
}

/// How much queued work [`QueueCanceller::clear_queues`] dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueClearCounts {
    pub followups: usize,
    pub lanes: usize,
}

/// Pending follow-up work keyed by session key or session id.
pub trait QueueCanceller: Send + Sync {
    fn clear_queues(&self, keys: &[String]) -> QueueClearCounts;
}

/// Sub-agents and other processes started on behalf of a session.
pub trait SubprocessStopper: Send + Sync {
    /// Stop everything `requester_key` started.  Returns how many stopped.
    fn stop_dependents(&self, requester_key: &str) -> usize;
}

/// Lifecycle hook kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HookKind {
    #[serde(rename = "session.reset")]
    SessionReset,
    #[serde(rename = "session.abort")]
    SessionAbort,
}

/// A lifecycle notification.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookEvent {
    pub kind: HookKind,
    pub session_key: String,
    pub session_id: Option<String>,
    pub at: DateTime<Utc>,
}

impl HookEvent {
    pub fn new(kind: HookKind, session_key: &str, session_id: Option<&str>) -> Self {
        Self {
            kind,
            session_key: session_key.to_owned(),
            session_id: session_id.map(str::to_owned),
            at: Utc::now(),
        }
    }
}

/// Fire-and-forget hook delivery.  Must not block the caller.
pub trait HookNotifier: Send + Sync {
    fn notify(&self, event: HookEvent);
}

/// The full set of collaborators handed to the orchestrator.
#[derive(Clone)]
pub struct Collaborators {
    pub runs: Arc<dyn RunController>,
    pub queues: Arc<dyn QueueCanceller>,
    pub subprocesses: Arc<dyn SubprocessStopper>,
    pub hooks: Arc<dyn HookNotifier>,
}
