use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Session store layout and lifecycle limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Root directory for all persisted session state.
    #[serde(default = "d_state_path")]
    pub state_path: PathBuf,

    /// Agent that owns bare (legacy, unprefixed) session keys.
    #[serde(default = "d_default_agent")]
    pub default_agent: String,

    /// Rest segment of the main session key (`agent:<agentId>:<mainKey>`).
    /// The default agent's main session can never be deleted.
    #[serde(default = "d_main_key")]
    pub main_key: String,

    /// Whether each agent gets its own store file or all share one.
    #[serde(default)]
    pub scope: StoreScope,

    /// How long `sessions.delete` waits for a live run to stop after
    /// signalling abort.
    #[serde(default = "d_delete_wait_ms")]
    pub delete_wait_ms: u64,

    /// Default line budget for `sessions.compact`.
    #[serde(default = "d_compact_max_lines")]
    pub compact_max_lines: usize,

    /// Lifetime of a cached `sessions.archived` listing used by
    /// restore-by-index.
    #[serde(default = "d_listing_ttl_secs")]
    pub listing_ttl_secs: u64,

    /// How long an abort aimed at a session with no entry yet is kept
    /// waiting for that entry to be created.
    #[serde(default = "d_abort_flag_ttl_secs")]
    pub abort_flag_ttl_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            state_path: d_state_path(),
            default_agent: d_default_agent(),
            main_key: d_main_key(),
            scope: StoreScope::default(),
            delete_wait_ms: d_delete_wait_ms(),
            compact_max_lines: d_compact_max_lines(),
            listing_ttl_secs: d_listing_ttl_secs(),
            abort_flag_ttl_secs: d_abort_flag_ttl_secs(),
        }
    }
}

/// Store file scoping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreScope {
    /// `<state>/agents/<agentId>/sessions/sessions.json`
    #[default]
    PerAgent,
    /// `<state>/sessions/sessions.json` shared by every agent.
    Global,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_state_path() -> PathBuf {
    PathBuf::from("./data")
}
fn d_default_agent() -> String {
    "main".into()
}
fn d_main_key() -> String {
    "main".into()
}
fn d_delete_wait_ms() -> u64 {
    15_000
}
fn d_compact_max_lines() -> usize {
    400
}
fn d_listing_ttl_secs() -> u64 {
    600
}
fn d_abort_flag_ttl_secs() -> u64 {
    3600
}
