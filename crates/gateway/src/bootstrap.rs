//! AppState construction and background-task spawning.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use tk_domain::config::{Config, ConfigSeverity};

use crate::runtime::hooks::HookBus;
use crate::runtime::queue::FollowupQueue;
use crate::runtime::runs::RunRegistry;
use crate::runtime::subagents::SubagentRegistry;
use crate::runtime::{Collaborators, LifecycleOrchestrator};
use crate::state::AppState;

/// Validate config, prepare the state directory and return a fully-wired
/// [`AppState`].
///
/// `restart_tx` is registered as the in-process restart listener.
pub fn build_app_state(
    config: Arc<Config>,
    config_path: impl Into<PathBuf>,
    restart_tx: Arc<tokio::sync::Notify>,
) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let error_count = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if error_count > 0 {
        anyhow::bail!("config validation failed with {error_count} error(s)");
    }

    // ── State directory ──────────────────────────────────────────────
    let state_path = &config.sessions.state_path;
    std::fs::create_dir_all(state_path)
        .with_context(|| format!("creating state directory {}", state_path.display()))?;
    tracing::info!(
        path = %state_path.display(),
        scope = ?config.sessions.scope,
        default_agent = %config.sessions.default_agent,
        "session state ready"
    );

    // ── Collaborators ────────────────────────────────────────────────
    let runs = Arc::new(RunRegistry::new());
    let queue = Arc::new(FollowupQueue::new());
    let subagents = Arc::new(SubagentRegistry::new());
    let hooks = Arc::new(HookBus::new());
    let collab = Collaborators {
        runs: runs.clone(),
        queues: queue.clone(),
        subprocesses: subagents.clone(),
        hooks: hooks.clone(),
    };

    // ── Orchestrator ─────────────────────────────────────────────────
    let orchestrator = Arc::new(LifecycleOrchestrator::new(config.clone(), collab));
    if config.gateway.restart_enabled {
        orchestrator
            .restarter()
            .register_listener(restart_tx.clone());
        tracing::info!("in-process restart listener registered");
    } else {
        tracing::info!("gateway.restart disabled");
    }
    tracing::info!(
        delete_wait_ms = config.sessions.delete_wait_ms,
        compact_max_lines = config.sessions.compact_max_lines,
        "lifecycle orchestrator ready"
    );

    Ok(AppState {
        config,
        config_path: config_path.into(),
        orchestrator,
        runs,
        queue,
        subagents,
        hooks,
        restart_tx,
    })
}

/// Spawn the long-running background tasks.  Returns the handles so the serve loop can stop them before
/// a rebuild.
pub fn spawn_background_tasks(state: &AppState) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = Vec::new();

    // ── Periodic listing and abort-flag expiry ───────────────────────
    {
        let orchestrator = state.orchestrator.clone();
        handles.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                let listings = orchestrator.listings().prune_expired();
                let abort_flags = orchestrator.abort_flags().prune_expired();
                if listings + abort_flags > 0 {
                    tracing::debug!(
                        listings,
                        abort_flags,
                        locked_paths = orchestrator.store().locked_paths(),
                        "expired listings and abort flags dropped"
                    );
                }
            }
        }));
    }

    tracing::info!("background tasks spawned");
    handles
}
