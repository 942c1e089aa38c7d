//! `gateway.restart` dispatch.
//!
//! Prefers the in-process listener registered by the serve loop (graceful
//! shutdown followed by a rebuild with freshly loaded config).  Without a
//! listener, falls back to the configured external command.

use std::process::ExitStatus;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use tk_domain::config::GatewayConfig;
use tk_domain::error::{Error, Result};

/// Which restart path fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RestartMechanism {
    Signal,
    Command,
}

pub struct Restarter {
    enabled: bool,
    command: Option<Vec<String>>,
    listener: RwLock<Option<Arc<Notify>>>,
}

impl Restarter {
    pub fn new(cfg: &GatewayConfig) -> Self {
        Self {
            enabled: cfg.restart_enabled,
            command: cfg.restart_command.clone(),
            listener: RwLock::new(None),
        }
    }

    /// Register the in-process restart listener.
    pub fn register_listener(&self, notify: Arc<Notify>) {
        *self.listener.write() = Some(notify);
    }

    pub fn has_listener(&self) -> bool {
        self.listener.read().is_some()
    }

    pub async fn restart(&self) -> Result<RestartMechanism> {
        if !self.enabled {
            return Err(Error::InvalidRequest(
                "restart is disabled (set gateway.restart_enabled = true)".into(),
            ));
        }

        let listener = self.listener.read().clone();
        if let Some(notify) = listener {
            tracing::info!(mechanism = "signal", "restart requested");
            notify.notify_one();
            return Ok(RestartMechanism::Signal);
        }

        let Some((program, args)) = self.command.as_ref().and_then(|c| c.split_first()) else {
            return Err(Error::Unavailable(
                "no restart listener registered and no restart_command configured".into(),
            ));
        };

        tracing::info!(mechanism = "command", program = %program, "restart requested");
        spawn_reaped(program, args)?;
        Ok(RestartMechanism::Command)
    }
}

/// Start the restart helper.  A detached task waits on it and yields the
/// exit status, or `None` if waiting failed.
fn spawn_reaped(program: &str, args: &[String]) -> Result<JoinHandle<Option<ExitStatus>>> {
    let mut child = tokio::process::Command::new(program)
        .args(args)
        .stdin(std::process::Stdio::null())
        .spawn()
        .map_err(|e| Error::Other(format!("restart command `{program}` failed: {e}")))?;
    let pid = child.id();
    tracing::debug!(pid = ?pid, "restart command spawned");

    let program = program.to_owned();
    Ok(tokio::spawn(async move {
        match child.wait().await {
            Ok(status) if status.success() => {
                tracing::info!(pid = ?pid, program = %program, %status, "restart command exited");
                Some(status)
            }
            Ok(status) => {
                tracing::warn!(pid = ?pid, program = %program, %status, "restart command failed");
                Some(status)
            }
            Err(e) => {
                tracing::warn!(pid = ?pid, program = %program, error = %e, "waiting on restart command failed");
                None
            }
        }
    }))
}
