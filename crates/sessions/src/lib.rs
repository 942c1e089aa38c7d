//! Session state for Threadkeeper.
//!
//! Owns the persisted `sessionKey → SessionEntry` store (one JSON file per
//! agent or scope), the key model that maps legacy aliases onto canonical
//! keys, and the transcript archive that renames `<sessionId>.jsonl` files
//! out of the way instead of deleting them.

pub mod archive;
pub mod key;
pub mod lifecycle;
pub mod lock;
pub mod store;
pub mod transcript;

pub use archive::{ArchiveReason, ArchivedTranscript, RestoreOutcome};
pub use key::{migrate, normalize_agent_id, KeyResolver, SessionTarget};
pub use lifecycle::{reset_entry, SessionPatch};
pub use lock::StoreLockMap;
pub use store::{get_or_mint, GroupActivation, SendPolicy, SessionEntry, SessionMap, SessionStore};
pub use transcript::CompactOutcome;

use tk_domain::error::{Error, Result};

/// Run blocking filesystem work off the async executor.
pub(crate) async fn spawn_io<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))?
}
