//! Transcript archive.
//!
//! Transcripts are never deleted.  An active `<sessionId>.jsonl` is renamed
//! to `<sessionId>.jsonl.<reason>.<timestamp>` and the directory itself is
//! the catalog: [`list`] rebuilds records from file names alone.
//!
//! Timestamps are UTC with `:` replaced by `-` (`2026-01-02T03-04-05.678Z`).
//! Names written without the millisecond part are still recognised and
//! order as `.000`.

use std::borrow::Cow;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use tk_domain::error::{Error, Result};
use tk_domain::trace::TraceEvent;

static ARCHIVED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<id>.+)\.jsonl\.(?P<reason>deleted|bak|replaced)\.(?P<ts>\d{4}-\d{2}-\d{2}T\d{2}-\d{2}-\d{2}(?:\.\d{3})?Z)$",
    )
    .unwrap()
});

/// Why a transcript left its active path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveReason {
    /// The session was deleted.
    Deleted,
    /// Pre-compaction backup.
    Bak,
    /// Displaced by a restore.
    Replaced,
}

impl ArchiveReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deleted => "deleted",
            Self::Bak => "bak",
            Self::Replaced => "replaced",
        }
    }
}

impl fmt::Display for ArchiveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArchiveReason {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "deleted" => Ok(Self::Deleted),
            "bak" => Ok(Self::Bak),
            "replaced" => Ok(Self::Replaced),
            other => Err(Error::InvalidRequest(format!(
                "unknown archive reason \"{other}\""
            ))),
        }
    }
}

/// An archived transcript, rebuilt from its file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedTranscript {
    pub path: PathBuf,
    pub session_id: String,
    pub reason: ArchiveReason,
    /// Timestamp exactly as it appears in the file name.
    pub deleted_at: String,
    pub size_bytes: u64,
}

/// Result of [`restore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreOutcome {
    pub restored_path: PathBuf,
    /// Where the previous occupant of `restored_path` was preserved.
    pub replaced: Option<PathBuf>,
    /// `false` when the archived copy could not be removed afterwards and
    /// still shows up in listings.
    pub source_removed: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Naming
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// File-name-safe UTC timestamp with millisecond precision.
pub fn archive_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H-%M-%S%.3fZ").to_string()
}

/// `<path>.<reason>.<timestamp>`
pub fn archived_path(path: &Path, reason: ArchiveReason, timestamp: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{reason}.{timestamp}"));
    PathBuf::from(name)
}

/// Split an archived file name into session id, reason and timestamp.
pub fn parse_archived_name(name: &str) -> Option<(String, ArchiveReason, String)> {
    let caps = ARCHIVED_NAME.captures(name)?;
    let reason = caps["reason"].parse().ok()?;
    Some((caps["id"].to_owned(), reason, caps["ts"].to_owned()))
}

/// Chronological sort key for an archive timestamp.
fn timestamp_key(ts: &str) -> Cow<'_, str> {
    match ts.strip_suffix('Z') {
        Some(head) if !head.contains('.') => Cow::Owned(format!("{head}.000Z")),
        _ => Cow::Borrowed(ts),
    }
}

/// The active path an archived file restores to, or `None` if the name is
/// not an archive name.
pub fn restored_path_for(archived: &Path) -> Option<PathBuf> {
    let name = archived.file_name()?.to_str()?;
    let (session_id, _, _) = parse_archived_name(name)?;
    Some(archived.with_file_name(format!("{session_id}.jsonl")))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Operations (blocking)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Rename an active transcript to its archived name.  Fails rather than
/// overwrite an existing archive.
pub fn archive(path: &Path, reason: ArchiveReason) -> Result<PathBuf> {
    let target = archived_path(path, reason, &archive_timestamp(Utc::now()));
    if target.exists() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("archive target exists: {}", target.display()),
        )));
    }
    std::fs::rename(path, &target)?;

    TraceEvent::TranscriptArchived {
        path: target.display().to_string(),
        reason: reason.to_string(),
    }
    .emit();
    Ok(target)
}

/// All archived transcripts in `dir`, newest first.
///
/// Best effort: a missing directory is empty, and entries that do not
/// match or cannot be stat'ed are skipped.
pub fn list(dir: &Path) -> Vec<ArchivedTranscript> {
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut out: Vec<ArchivedTranscript> = read_dir
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name();
            let (session_id, reason, deleted_at) = parse_archived_name(name.to_str()?)?;
            let meta = entry.metadata().ok()?;
            if !meta.is_file() {
                return None;
            }
            Some(ArchivedTranscript {
                path: entry.path(),
                session_id,
                reason,
                deleted_at,
                size_bytes: meta.len(),
            })
        })
        .collect();

    out.sort_by(|a, b| timestamp_key(&b.deleted_at).cmp(&timestamp_key(&a.deleted_at)));
    out
}

/// Move an archived transcript back to its active path.
///
/// The archived content is staged beside the target and swapped in with a
/// single rename.  A file already at the target is kept under a `replaced`
/// name first.  Until that rename succeeds the directory is unchanged.
pub fn restore(archived: &Path) -> Result<RestoreOutcome> {
    if !archived.is_file() {
        return Err(Error::NotFound(format!(
            "archived transcript not found: {}",
            archived.display()
        )));
    }
    let restored_path = restored_path_for(archived).ok_or_else(|| {
        Error::InvalidRequest(format!(
            "not an archived transcript: {}",
            archived.display()
        ))
    })?;

    let staged = stage_copy(archived, &restored_path)?;
    let replaced = replace_preserving(staged, &restored_path, ArchiveReason::Replaced)?;

    let source_removed = match std::fs::remove_file(archived) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(
                path = %archived.display(),
                error = %e,
                "restored transcript but could not remove the archived copy"
            );
            false
        }
    };

    TraceEvent::TranscriptRestored {
        path: restored_path.display().to_string(),
        replaced: replaced.as_ref().map(|p| p.display().to_string()),
    }
    .emit();

    Ok(RestoreOutcome {
        restored_path,
        replaced,
        source_removed,
    })
}

/// New temp file in `target`'s directory, for a later atomic swap.
pub(crate) fn stage_in(target: &Path) -> Result<NamedTempFile> {
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    Ok(tempfile::Builder::new()
        .prefix(".transcript-")
        .suffix(".tmp")
        .tempfile_in(dir)?)
}

fn stage_copy(source: &Path, target: &Path) -> Result<NamedTempFile> {
    let mut staged = stage_in(target)?;
    let mut src = std::fs::File::open(source)?;
    std::io::copy(&mut src, staged.as_file_mut())?;
    staged.as_file_mut().flush()?;
    staged.as_file().sync_all()?;
    Ok(staged)
}

/// Swap `staged` into `target`, keeping any current occupant under
/// `reason`.  Returns where the occupant was kept.
///
/// The occupant is linked (or copied) to its archive name while still in
/// place, so a failure at any point leaves `target` as it was.
pub(crate) fn replace_preserving(
    staged: NamedTempFile,
    target: &Path,
    reason: ArchiveReason,
) -> Result<Option<PathBuf>> {
    let kept = if target.exists() {
        let keep = archived_path(target, reason, &archive_timestamp(Utc::now()));
        preserve(target, &keep)?;
        Some(keep)
    } else {
        None
    };

    if let Err(e) = staged.persist(target) {
        if let Some(keep) = &kept {
            let _ = std::fs::remove_file(keep);
        }
        return Err(Error::Io(e.error));
    }

    if let Some(keep) = &kept {
        TraceEvent::TranscriptArchived {
            path: keep.display().to_string(),
            reason: reason.to_string(),
        }
        .emit();
    }
    Ok(kept)
}

fn preserve(active: &Path, keep: &Path) -> Result<()> {
    match std::fs::hard_link(active, keep) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(Error::Io(e)),
        Err(e) => {
            tracing::debug!(error = %e, "hard link failed, copying instead");
            if keep.exists() {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!("archive target exists: {}", keep.display()),
                )));
            }
            if let Err(e) = std::fs::copy(active, keep) {
                let _ = std::fs::remove_file(keep);
                return Err(Error::Io(e));
            }
            Ok(())
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Async wrappers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn archive_async(path: PathBuf, reason: ArchiveReason) -> Result<PathBuf> {
    crate::spawn_io(move || archive(&path, reason)).await
}

pub async fn list_async(dir: PathBuf) -> Vec<ArchivedTranscript> {
    crate::spawn_io(move || Ok(list(&dir)))
        .await
        .unwrap_or_default()
}

pub async fn restore_async(archived: PathBuf) -> Result<RestoreOutcome> {
    crate::spawn_io(move || restore(&archived)).await
}
