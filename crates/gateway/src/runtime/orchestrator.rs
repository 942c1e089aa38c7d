//! Session lifecycle operations.
//!
//! Every store mutation runs inside [`SessionStore::update`] with
//! [`migrate`] applied first, so legacy keys are folded onto the canonical
//! key before anything else looks at them.  Slow work (waiting for runs,
//! transcript rewrites, archive scans) happens outside the store lock.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use tk_domain::config::Config;
use tk_domain::error::{Error, Result};
use tk_domain::trace::TraceEvent;
use tk_sessions::archive::{self, ArchiveReason, ArchivedTranscript, RestoreOutcome};
use tk_sessions::lifecycle::{reset_entry, SessionPatch};
use tk_sessions::transcript;
use tk_sessions::{migrate, normalize_agent_id, KeyResolver, SessionEntry, SessionMap, SessionStore};

use super::abort_flags::AbortFlags;
use super::collaborators::{Collaborators, HookEvent, HookKind};
use super::listings::ListingCache;
use super::restart::{RestartMechanism, Restarter};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Inputs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub agent_id: Option<String>,
    pub limit: Option<usize>,
    /// Case-insensitive substring of the key or label.
    pub search: Option<String>,
    /// Only sessions updated within this many minutes.
    pub active_minutes: Option<u64>,
}

#[derive(Debug, Clone)]
pub enum ResolveBy {
    Key(String),
    SessionId(String),
    Label(String),
}

#[derive(Debug, Clone)]
pub enum RestoreTarget {
    Path(PathBuf),
    /// 1-based index into the caller's latest archived listing.
    Index {
        index: usize,
        listing_id: Option<String>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Outputs
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize)]
pub struct SessionRow {
    pub key: String,
    #[serde(flatten)]
    pub entry: SessionEntry,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    pub path: PathBuf,
    pub count: usize,
    pub sessions: Vec<SessionRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResult {
    pub key: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryResult {
    pub key: String,
    pub created: bool,
    pub entry: SessionEntry,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteResult {
    pub key: String,
    pub deleted: bool,
    pub archived: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompactResult {
    pub key: String,
    pub compacted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kept: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

impl CompactResult {
    fn skipped(key: &str, reason: &'static str) -> Self {
        Self {
            key: key.to_owned(),
            compacted: false,
            kept: None,
            archived: None,
            reason: Some(reason),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AbortResult {
    pub key: String,
    pub session_id: Option<String>,
    pub run_aborted: bool,
    /// `true` when the flag was written to the store entry, `false` when it
    /// is held in memory until the entry exists.
    pub persisted: bool,
    pub followups_cleared: usize,
    pub lanes_cleared: usize,
    pub subagents_stopped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchivedRow {
    pub index: usize,
    #[serde(flatten)]
    pub record: ArchivedTranscript,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedResult {
    pub listing_id: String,
    pub agent_id: String,
    pub dir: PathBuf,
    pub archived: Vec<ArchivedRow>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResult {
    pub session_id: String,
    #[serde(flatten)]
    pub outcome: RestoreOutcome,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Orchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct LifecycleOrchestrator {
    config: Arc<Config>,
    resolver: KeyResolver,
    store: SessionStore,
    collab: Collaborators,
    abort_flags: AbortFlags,
    listings: ListingCache,
    restarter: Restarter,
}

impl LifecycleOrchestrator {
    pub fn new(config: Arc<Config>, collab: Collaborators) -> Self {
        Self {
            resolver: KeyResolver::from_config(&config.sessions),
            store: SessionStore::new(),
            abort_flags: AbortFlags::new(Duration::from_secs(
                config.sessions.abort_flag_ttl_secs,
            )),
            listings: ListingCache::new(Duration::from_secs(config.sessions.listing_ttl_secs)),
            restarter: Restarter::new(&config.gateway),
            collab,
            config,
        }
    }

    pub fn resolver(&self) -> &KeyResolver {
        &self.resolver
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn abort_flags(&self) -> &AbortFlags {
        &self.abort_flags
    }

    pub fn listings(&self) -> &ListingCache {
        &self.listings
    }

    pub fn restarter(&self) -> &Restarter {
        &self.restarter
    }

    fn agent_or_default(&self, agent_id: Option<&str>) -> Result<String> {
        match agent_id {
            Some(id) => normalize_agent_id(id),
            None => Ok(self.resolver.default_agent().to_owned()),
        }
    }

    // ── list / resolve ──────────────────────────────────────────────

    pub async fn list(&self, query: ListQuery) -> Result<ListResult> {
        let agent_id = self.agent_or_default(query.agent_id.as_deref())?;
        let path = self.resolver.store_path(&agent_id);
        let sessions = self.store.load(&path).await?;

        let needle = query.search.as_deref().map(str::to_lowercase);
        let cutoff = query.active_minutes.and_then(|m| {
            let span = chrono::Duration::try_minutes(i64::try_from(m).ok()?)?;
            Utc::now().checked_sub_signed(span)
        });

        let mut rows: Vec<SessionRow> = sessions
            .into_iter()
            .filter(|(key, entry)| match &needle {
                Some(n) => {
                    key.to_lowercase().contains(n)
                        || entry
                            .label
                            .as_deref()
                            .is_some_and(|l| l.to_lowercase().contains(n))
                }
                None => true,
            })
            .filter(|(_, entry)| cutoff.map_or(true, |c| entry.updated_at >= c))
            .map(|(key, entry)| SessionRow { key, entry })
            .collect();

        rows.sort_by(|a, b| {
            b.entry
                .updated_at
                .cmp(&a.entry.updated_at)
                .then_with(|| a.key.cmp(&b.key))
        });
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        Ok(ListResult {
            path,
            count: rows.len(),
            sessions: rows,
        })
    }

    pub async fn resolve(&self, by: ResolveBy, agent_id: Option<&str>) -> Result<ResolveResult> {
        match by {
            ResolveBy::Key(key) => {
                let target = self.resolver.resolve_target(&key)?;
                let found = self
                    .store
                    .update(&target.store_path, |s| {
                        Ok(migrate(s, &target.alias_keys)
                            .and_then(|k| s.get(&k).map(|e| (k, e.session_id.clone()))))
                    })
                    .await?;
                let (key, session_id) =
                    found.ok_or_else(|| Error::NotFound(format!("no session for key {key}")))?;
                Ok(ResolveResult { key, session_id })
            }
            ResolveBy::SessionId(id) => {
                self.find_in_store(agent_id, |e| e.session_id == id)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("no session with id {id}")))
            }
            ResolveBy::Label(label) => {
                self.find_in_store(agent_id, |e| e.label.as_deref() == Some(label.as_str()))
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("no session labelled \"{label}\"")))
            }
        }
    }

    async fn find_in_store(
        &self,
        agent_id: Option<&str>,
        pred: impl Fn(&SessionEntry) -> bool,
    ) -> Result<Option<ResolveResult>> {
        let agent_id = self.agent_or_default(agent_id)?;
        let sessions = self.store.load(&self.resolver.store_path(&agent_id)).await?;
        let mut hits: Vec<_> = sessions.iter().filter(|(_, e)| pred(e)).collect();
        // Prefer canonical keys over leftover legacy spellings.
        hits.sort_by_key(|(k, _)| (!k.starts_with("agent:"), k.as_str().to_owned()));
        Ok(hits.first().map(|(k, e)| ResolveResult {
            key: (*k).clone(),
            session_id: e.session_id.clone(),
        }))
    }

    // ── patch / reset ───────────────────────────────────────────────

    pub async fn patch(&self, key: &str, patch: SessionPatch) -> Result<EntryResult> {
        let target = self.resolver.resolve_target(key)?;
        let canonical = target.canonical_key.clone();
        let pending_abort = self.abort_flags.is_set(&canonical);

        let (entry, created) = self
            .store
            .update(&target.store_path, |s| {
                migrate(s, &target.alias_keys);
                let created = !s.contains_key(&canonical);
                if created {
                    let mut entry = SessionEntry::mint();
                    entry.aborted_last_run = pending_abort;
                    s.insert(canonical.clone(), entry);
                }
                patch.apply(s, &canonical)?;
                let entry = s
                    .get(&canonical)
                    .cloned()
                    .ok_or_else(|| Error::Other(format!("entry vanished: {canonical}")))?;
                Ok((entry, created))
            })
            .await?;

        if created {
            self.abort_flags.take(&canonical);
            TraceEvent::SessionCreated {
                session_key: canonical.clone(),
                session_id: entry.session_id.clone(),
            }
            .emit();
        }
        tracing::debug!(session_key = %canonical, created, "session patched");

        Ok(EntryResult {
            key: canonical,
            created,
            entry,
        })
    }

    pub async fn reset(&self, key: &str) -> Result<EntryResult> {
        let target = self.resolver.resolve_target(key)?;
        let canonical = target.canonical_key.clone();

        let (old_session_id, entry) = self
            .store
            .update(&target.store_path, |s| {
                migrate(s, &target.alias_keys);
                let prev = s.get(&canonical);
                let old_id = prev.map(|e| e.session_id.clone());
                let next = reset_entry(prev);
                s.insert(canonical.clone(), next.clone());
                Ok((old_id, next))
            })
            .await?;

        self.abort_flags.take(&canonical);

        TraceEvent::SessionReset {
            session_key: canonical.clone(),
            old_session_id: old_session_id.clone(),
            new_session_id: entry.session_id.clone(),
        }
        .emit();
        self.collab.hooks.notify(HookEvent::new(
            HookKind::SessionReset,
            &canonical,
            Some(&entry.session_id),
        ));

        Ok(EntryResult {
            key: canonical,
            created: old_session_id.is_none(),
            entry,
        })
    }

    // ── delete ──────────────────────────────────────────────────────

    pub async fn delete(&self, key: &str, delete_transcript: bool) -> Result<DeleteResult> {
        let target = self.resolver.resolve_target(key)?;
        let canonical = target.canonical_key.clone();
        if self.resolver.is_main_key(&canonical) {
            return Err(Error::InvalidRequest(format!(
                "cannot delete the main session ({canonical})"
            )));
        }

        let snapshot = self.store.load(&target.store_path).await?;
        let session_id = find_entry(&snapshot, &target.alias_keys).map(|e| e.session_id.clone());

        // 1. Queued work under any spelling of the session.
        let mut queue_keys = target.alias_keys.clone();
        if let Some(sid) = &session_id {
            queue_keys.push(sid.clone());
        }
        let cleared = self.collab.queues.clear_queues(&queue_keys);

        // 2. Sub-agents started by this session.
        let stopped = self.collab.subprocesses.stop_dependents(&canonical);

        // 3. The live run, if any, must be gone before the store changes.
        if let Some(sid) = &session_id {
            if self.collab.runs.is_active(sid) {
                self.collab.runs.abort(sid);
                let wait = Duration::from_millis(self.config.sessions.delete_wait_ms);
                if !self.collab.runs.wait_for_end(sid, wait).await {
                    tracing::warn!(
                        session_key = %canonical,
                        session_id = %sid,
                        wait_ms = self.config.sessions.delete_wait_ms,
                        "run did not stop in time, delete abandoned"
                    );
                    return Err(Error::Unavailable(format!(
                        "session {canonical} is still running; retry later"
                    )));
                }
            }
        }

        // 4. Remove the entry and any alias still pointing at the same id.
        let removed = self
            .store
            .update(&target.store_path, |s| {
                migrate(s, &target.alias_keys);
                let Some(entry) = s.remove(&canonical) else {
                    return Ok(Vec::new());
                };
                let sid = entry.session_id.clone();
                let mut removed = vec![entry];
                for alias in &target.alias_keys[1..] {
                    if s.get(alias).is_some_and(|e| e.session_id == sid) {
                        removed.extend(s.remove(alias));
                    }
                }
                Ok(removed)
            })
            .await?;

        self.abort_flags.take(&canonical);

        // 5. Best-effort archival; the store change is already durable.
        let mut archived = Vec::new();
        if delete_transcript {
            let mut paths: Vec<PathBuf> = Vec::new();
            for entry in &removed {
                for p in transcript::candidate_paths(&target.sessions_dir, entry) {
                    if !paths.contains(&p) {
                        paths.push(p);
                    }
                }
            }
            for path in paths {
                if !path.is_file() {
                    continue;
                }
                match archive::archive_async(path.clone(), ArchiveReason::Deleted).await {
                    Ok(to) => archived.push(to),
                    Err(e) => tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "failed to archive transcript of deleted session"
                    ),
                }
            }
        }

        TraceEvent::SessionDeleted {
            session_key: canonical.clone(),
            session_id: removed.first().map(|e| e.session_id.clone()),
            existed: !removed.is_empty(),
            archived: archived.len(),
        }
        .emit();
        tracing::debug!(
            session_key = %canonical,
            followups = cleared.followups,
            lanes = cleared.lanes,
            subagents = stopped,
            "session delete complete"
        );

        Ok(DeleteResult {
            key: canonical,
            deleted: !removed.is_empty(),
            archived,
        })
    }

    // ── compact ─────────────────────────────────────────────────────

    pub async fn compact(&self, key: &str, max_lines: usize) -> Result<CompactResult> {
        let target = self.resolver.resolve_target(key)?;
        let canonical = target.canonical_key.clone();
        let max_lines = max_lines.max(1);

        let entry = self
            .store
            .update(&target.store_path, |s| {
                migrate(s, &target.alias_keys);
                Ok(s.get(&canonical).cloned())
            })
            .await?;
        let Some(entry) = entry else {
            return Ok(CompactResult::skipped(&canonical, "no_session"));
        };

        let path = transcript::resolve_path(&target.sessions_dir, &entry);
        if !path.is_file() {
            return Ok(CompactResult::skipped(&canonical, "no_transcript"));
        }

        let Some(outcome) = transcript::compact_async(path, max_lines).await? else {
            return Ok(CompactResult::skipped(&canonical, "within_budget"));
        };

        let session_id = entry.session_id.clone();
        let usage_cleared = self
            .store
            .update(&target.store_path, |s| {
                migrate(s, &target.alias_keys);
                match s.get_mut(&canonical) {
                    Some(e) if e.session_id == session_id => {
                        e.clear_usage();
                        e.touch();
                        Ok(true)
                    }
                    _ => Ok(false),
                }
            })
            .await?;
        if !usage_cleared {
            tracing::debug!(session_key = %canonical, "session changed during compaction");
        }

        TraceEvent::TranscriptCompacted {
            session_key: canonical.clone(),
            session_id,
            lines_before: outcome.lines_before,
            lines_kept: outcome.lines_kept,
        }
        .emit();

        Ok(CompactResult {
            key: canonical,
            compacted: true,
            kept: Some(outcome.lines_kept),
            archived: Some(outcome.archived),
            reason: None,
        })
    }

    // ── stop / abort ────────────────────────────────────────────────

    /// Abort `explicit` if given, else the caller's `ambient` session.
    pub async fn abort(&self, explicit: Option<&str>, ambient: Option<&str>) -> Result<AbortResult> {
        let key = explicit.or(ambient).ok_or_else(|| {
            Error::InvalidRequest("no session to abort: pass `target` or `key`".into())
        })?;
        let target = self.resolver.resolve_target(key)?;
        let canonical = target.canonical_key.clone();

        let snapshot = self.store.load(&target.store_path).await?;
        let session_id = find_entry(&snapshot, &target.alias_keys).map(|e| e.session_id.clone());

        let run_aborted = session_id
            .as_deref()
            .is_some_and(|sid| self.collab.runs.abort(sid));

        let mut queue_keys = vec![canonical.clone()];
        if let Some(sid) = &session_id {
            queue_keys.push(sid.clone());
        }
        let cleared = self.collab.queues.clear_queues(&queue_keys);

        let persisted = self
            .store
            .update(&target.store_path, |s| {
                migrate(s, &target.alias_keys);
                match s.get_mut(&canonical) {
                    Some(e) => {
                        e.aborted_last_run = true;
                        e.touch();
                        Ok(true)
                    }
                    None => Ok(false),
                }
            })
            .await?;
        if !persisted {
            self.abort_flags.set(&canonical);
        }

        self.collab.hooks.notify(HookEvent::new(
            HookKind::SessionAbort,
            &canonical,
            session_id.as_deref(),
        ));

        let subagents_stopped = self.collab.subprocesses.stop_dependents(&canonical);

        TraceEvent::SessionAborted {
            session_key: canonical.clone(),
            session_id: session_id.clone(),
            run_aborted,
            persisted,
            subagents_stopped,
        }
        .emit();

        Ok(AbortResult {
            key: canonical,
            session_id,
            run_aborted,
            persisted,
            followups_cleared: cleared.followups,
            lanes_cleared: cleared.lanes,
            subagents_stopped,
        })
    }

    // ── archive listing / restore ───────────────────────────────────

    pub async fn archived(&self, client: &str, agent_id: Option<&str>) -> Result<ArchivedResult> {
        let agent_id = self.agent_or_default(agent_id)?;
        let dir = self.resolver.sessions_dir(&agent_id);
        let records = archive::list_async(dir.clone()).await;
        let listing_id = self.listings.store(client, records.clone());

        Ok(ArchivedResult {
            listing_id,
            agent_id,
            dir,
            archived: records
                .into_iter()
                .enumerate()
                .map(|(i, record)| ArchivedRow {
                    index: i + 1,
                    record,
                })
                .collect(),
        })
    }

    pub async fn restore(&self, client: &str, target: RestoreTarget) -> Result<RestoreResult> {
        let path = match target {
            RestoreTarget::Path(p) => p,
            RestoreTarget::Index { index, listing_id } => {
                self.listings
                    .lookup(client, listing_id.as_deref(), index)?
                    .path
            }
        };

        // Existence first: a missing path is NOT_FOUND whatever its name.
        if !path.is_file() {
            return Err(Error::NotFound(format!(
                "archived transcript not found: {}",
                path.display()
            )));
        }
        let session_id = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(archive::parse_archived_name)
            .map(|(id, _, _)| id)
            .ok_or_else(|| {
                Error::InvalidRequest(format!("not an archived transcript: {}", path.display()))
            })?;
        self.ensure_in_state_dir(&path)?;

        let outcome = archive::restore_async(path).await?;
        Ok(RestoreResult {
            session_id,
            outcome,
        })
    }

    fn ensure_in_state_dir(&self, path: &Path) -> Result<()> {
        let outside = || {
            Error::InvalidRequest(format!(
                "{} is outside the state directory",
                path.display()
            ))
        };
        let root = std::fs::canonicalize(self.resolver.state_path()).map_err(|_| outside())?;
        let full = std::fs::canonicalize(path)?;
        if full.starts_with(&root) {
            Ok(())
        } else {
            Err(outside())
        }
    }

    // ── restart ─────────────────────────────────────────────────────

    pub async fn restart(&self) -> Result<RestartMechanism> {
        self.restarter.restart().await
    }
}

/// The entry under the first alias that has one.
fn find_entry<'a>(sessions: &'a SessionMap, alias_keys: &[String]) -> Option<&'a SessionEntry> {
    alias_keys.iter().find_map(|k| sessions.get(k))
}
