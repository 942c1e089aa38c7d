//! Guarded session store.
//!
//! Persists `sessionKey → SessionEntry` in one `sessions.json` per agent (or
//! one shared file in global scope).  All mutation goes through
//! [`SessionStore::update`], which holds the per-path lock for the whole
//! load → mutate → persist cycle and replaces the file atomically.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tk_domain::error::{Error, Result};
use tk_domain::trace::TraceEvent;

use crate::lock::StoreLockMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session entry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Contents of one store file.
pub type SessionMap = HashMap<String, SessionEntry>;

/// A single session tracked by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    pub session_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub system_sent: bool,
    #[serde(default)]
    pub aborted_last_run: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbose_level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_level: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_tokens: Option<u64>,

    /// The model used for this session (e.g. `"openai/gpt-4o"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// `None` inherits the channel default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_policy: Option<SendPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills_snapshot: Option<serde_json::Value>,
    /// Transcript path; `<sessionsDir>/<sessionId>.jsonl` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_file: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_activation: Option<GroupActivation>,
    #[serde(default)]
    pub group_activation_needs_system_intro: bool,

    /// Fields written by newer versions; kept verbatim across updates.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Whether the agent may send replies in this session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendPolicy {
    Allow,
    Deny,
}

/// When the agent responds in a group conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupActivation {
    Mention,
    Always,
}

impl SessionEntry {
    /// A blank entry with a freshly minted session id.
    pub fn mint() -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string())
    }

    /// A blank entry for an existing session id.
    pub fn with_id(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            updated_at: Utc::now(),
            system_sent: false,
            aborted_last_run: false,
            thinking_level: None,
            verbose_level: None,
            reasoning_level: None,
            input_tokens: None,
            output_tokens: None,
            total_tokens: None,
            context_tokens: None,
            model: None,
            send_policy: None,
            label: None,
            last_channel: None,
            last_to: None,
            skills_snapshot: None,
            session_file: None,
            group_activation: None,
            group_activation_needs_system_intro: false,
            extra: serde_json::Map::new(),
        }
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Drop the usage counters that describe a transcript which no longer
    /// exists in that form.  `context_tokens` describes the model window and
    /// is kept.
    pub fn clear_usage(&mut self) {
        self.input_tokens = None;
        self.output_tokens = None;
        self.total_tokens = None;
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Exclusive, atomic read-modify-write access to store files.
///
/// The store holds no cached content: every [`update`](Self::update)
/// re-reads the file under the lock, so the on-disk file is the single
/// source of truth.
#[derive(Default)]
pub struct SessionStore {
    locks: StoreLockMap,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against the current content of the store at `path` and
    /// persist whatever it leaves behind.
    ///
    /// Calls on the same path are serialized.  If `f` returns an error the
    /// file is not touched and the error is returned as-is.
    pub async fn update<R, F>(&self, path: &Path, f: F) -> Result<R>
    where
        F: FnOnce(&mut SessionMap) -> Result<R> + Send,
        R: Send,
    {
        let permit = self.locks.acquire(path).await?;

        let result = async {
            let mut sessions = read_store(path).await?;
            let out = f(&mut sessions)?;
            write_store(path, &sessions).await?;
            Ok(out)
        }
        .await;

        drop(permit);
        self.locks.prune_idle();
        result
    }

    /// Read-only snapshot of the store at `path`, without locking.
    ///
    /// Anything decided from a snapshot must be re-checked inside
    /// [`update`](Self::update) before it is acted upon.
    pub async fn load(&self, path: &Path) -> Result<SessionMap> {
        read_store(path).await
    }

    /// Number of store files with a live lock (for monitoring).
    pub fn locked_paths(&self) -> usize {
        self.locks.path_count()
    }
}

/// Load a store file.  A missing or empty file is an empty store; a file
/// that does not parse is an error, never silently discarded.
async fn read_store(path: &Path) -> Result<SessionMap> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(SessionMap::new()),
        Err(e) => return Err(Error::Io(e)),
    };
    if raw.trim().is_empty() {
        return Ok(SessionMap::new());
    }
    serde_json::from_str(&raw).map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "session store is not valid JSON");
        Error::Json(e)
    })
}

/// Persist a store file: write a sibling temp file, fsync, then rename
/// over the target so readers see either the old or the new content.
async fn write_store(path: &Path, sessions: &SessionMap) -> Result<()> {
    let json = serde_json::to_string_pretty(sessions)?;
    let path = path.to_path_buf();

    crate::spawn_io(move || {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".sessions-")
            .suffix(".tmp")
            .tempfile_in(&dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    })
    .await
}

/// Insert a freshly minted entry under `key` unless one already exists.
/// Returns the entry and whether it was created.
pub fn get_or_mint<'a>(sessions: &'a mut SessionMap, key: &str) -> (&'a mut SessionEntry, bool) {
    let created = !sessions.contains_key(key);
    let entry = sessions.entry(key.to_owned()).or_insert_with(|| {
        let entry = SessionEntry::mint();
        TraceEvent::SessionCreated {
            session_key: key.to_owned(),
            session_id: entry.session_id.clone(),
        }
        .emit();
        entry
    });
    (entry, created)
}
