//! In-process registry of live runs, keyed by session id.
//!
//! Each running turn holds a [`RunGuard`].  The guard carries a
//! [`CancelToken`] the turn loop polls, and signals completion to any
//! waiter when it is dropped, whether the run finished or bailed out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::watch;
use uuid::Uuid;

use super::collaborators::RunController;

/// A cancellation token that can be checked by the runtime loop.
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

struct ActiveRun {
    run_id: Uuid,
    token: CancelToken,
    done: watch::Receiver<bool>,
}

type RunMap = Arc<Mutex<HashMap<String, ActiveRun>>>;

/// Tracks live runs per session id.
#[derive(Default)]
pub struct RunRegistry {
    runs: RunMap,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a run for `session_id`.  A newer registration replaces an
    /// older one; the older guard no longer affects the map.
    pub fn register(&self, session_id: &str) -> RunGuard {
        let run_id = Uuid::new_v4();
        let token = CancelToken::new();
        let (done_tx, done_rx) = watch::channel(false);
        self.runs.lock().insert(
            session_id.to_owned(),
            ActiveRun {
                run_id,
                token: token.clone(),
                done: done_rx,
            },
        );
        tracing::debug!(session_id, %run_id, "run registered");
        RunGuard {
            session_id: session_id.to_owned(),
            run_id,
            token,
            done: done_tx,
            runs: self.runs.clone(),
        }
    }

    /// Number of live runs (for monitoring).
    pub fn active_count(&self) -> usize {
        self.runs.lock().len()
    }
}

#[async_trait]
impl RunController for RunRegistry {
    fn is_active(&self, session_id: &str) -> bool {
        self.runs.lock().contains_key(session_id)
    }

    fn abort(&self, session_id: &str) -> bool {
        match self.runs.lock().get(session_id) {
            Some(run) => {
                run.token.cancel();
                tracing::info!(session_id, run_id = %run.run_id, "run abort signalled");
                true
            }
            None => false,
        }
    }

    async fn wait_for_end(&self, session_id: &str, timeout: Duration) -> bool {
        let done = match self.runs.lock().get(session_id) {
            Some(run) => run.done.clone(),
            None => return true,
        };
        tokio::time::timeout(timeout, wait_done(done)).await.is_ok()
    }
}

async fn wait_done(mut done: watch::Receiver<bool>) {
    loop {
        if *done.borrow_and_update() {
            return;
        }
        // Sender dropped: the guard is gone, so the run is over.
        if done.changed().await.is_err() {
            return;
        }
    }
}

/// Held by a running turn.  Dropping it ends the run.
pub struct RunGuard {
    session_id: String,
    run_id: Uuid,
    token: CancelToken,
    done: watch::Sender<bool>,
    runs: RunMap,
}

impl RunGuard {
    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        {
            let mut runs = self.runs.lock();
            if runs
                .get(&self.session_id)
                .is_some_and(|r| r.run_id == self.run_id)
            {
                runs.remove(&self.session_id);
            }
        }
        let _ = self.done.send(true);
        tracing::debug!(session_id = %self.session_id, run_id = %self.run_id, "run ended");
    }
}
