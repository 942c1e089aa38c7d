//! JSONL transcripts on disk.
//!
//! Each session gets a `<sessionId>.jsonl` file under the sessions directory,
//! unless its entry points somewhere else through `sessionFile`.

use std::io::Write;
use std::path::{Path, PathBuf};

use tk_domain::error::Result;

use crate::archive::{self, ArchiveReason};
use crate::store::SessionEntry;

/// Default transcript location for a session id.
pub fn transcript_path(sessions_dir: &Path, session_id: &str) -> PathBuf {
    sessions_dir.join(format!("{session_id}.jsonl"))
}

/// Every path a session's transcript may live at, most specific first.
///
/// A relative `sessionFile` is taken relative to the sessions directory.
pub fn candidate_paths(sessions_dir: &Path, entry: &SessionEntry) -> Vec<PathBuf> {
    let mut paths = Vec::with_capacity(2);
    if let Some(file) = &entry.session_file {
        if file.is_absolute() {
            paths.push(file.clone());
        } else {
            paths.push(sessions_dir.join(file));
        }
    }
    let default = transcript_path(sessions_dir, &entry.session_id);
    if !paths.contains(&default) {
        paths.push(default);
    }
    paths
}

/// The transcript path to operate on: the first candidate that exists,
/// else the most specific one.
pub fn resolve_path(sessions_dir: &Path, entry: &SessionEntry) -> PathBuf {
    let candidates = candidate_paths(sessions_dir, entry);
    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .unwrap_or_else(|| candidates[0].clone())
}

/// Non-empty lines of a transcript, in order.
pub fn read_nonempty_lines(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(raw
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(str::to_owned)
        .collect())
}

/// What [`compact_file`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactOutcome {
    /// Full pre-compaction transcript, under reason `bak`.
    pub archived: PathBuf,
    pub lines_before: usize,
    pub lines_kept: usize,
}

/// Keep only the last `max_lines` non-empty lines of a transcript.
///
/// Returns `None` when the transcript already fits.  Otherwise the full
/// file is kept under a `bak` archive name and the tail is swapped into
/// place in one rename.
pub fn compact_file(path: &Path, max_lines: usize) -> Result<Option<CompactOutcome>> {
    let max_lines = max_lines.max(1);
    let lines = read_nonempty_lines(path)?;
    if lines.len() <= max_lines {
        return Ok(None);
    }

    let tail = &lines[lines.len() - max_lines..];
    let mut body = tail.join("\n");
    body.push('\n');

    let mut staged = archive::stage_in(path)?;
    staged.write_all(body.as_bytes())?;
    staged.as_file().sync_all()?;

    let archived = archive::replace_preserving(staged, path, ArchiveReason::Bak)?
        .ok_or_else(|| {
            tk_domain::error::Error::NotFound(format!(
                "transcript vanished during compaction: {}",
                path.display()
            ))
        })?;

    Ok(Some(CompactOutcome {
        archived,
        lines_before: lines.len(),
        lines_kept: tail.len(),
    }))
}

pub async fn compact_async(path: PathBuf, max_lines: usize) -> Result<Option<CompactOutcome>> {
    crate::spawn_io(move || compact_file(&path, max_lines)).await
}
