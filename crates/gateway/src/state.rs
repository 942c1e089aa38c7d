use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Notify;

use tk_domain::config::Config;

use crate::runtime::hooks::HookBus;
use crate::runtime::queue::FollowupQueue;
use crate::runtime::runs::RunRegistry;
use crate::runtime::subagents::SubagentRegistry;
use crate::runtime::LifecycleOrchestrator;

/// Shared application state passed to all API handlers.
///
/// The concrete collaborators are kept alongside the orchestrator so the
/// agent runtime can register runs, queue follow-ups and spawn sub-agents
/// against the same instances the orchestrator cancels.
#[derive(Clone)]
pub struct AppState {
    // ── Core ──────────────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub config_path: PathBuf,
    pub orchestrator: Arc<LifecycleOrchestrator>,

    // ── Collaborators ─────────────────────────────────────────────────
    pub runs: Arc<RunRegistry>,
    pub queue: Arc<FollowupQueue>,
    pub subagents: Arc<SubagentRegistry>,
    pub hooks: Arc<HookBus>,

    // ── Lifecycle ─────────────────────────────────────────────────────
    /// Notified by `gateway.restart`; the serve loop shuts down and rebuilds.
    pub restart_tx: Arc<Notify>,
}
