//! `sessions.*` RPC methods.
//!
//! Each method validates its whole params object first (collecting every
//! failure) and only then calls into the [`LifecycleOrchestrator`].
//!
//! [`LifecycleOrchestrator`]: crate::runtime::LifecycleOrchestrator

use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;

use tk_sessions::{GroupActivation, SendPolicy, SessionPatch};

use super::error::RpcError;
use super::params::Params;
use crate::runtime::orchestrator::{ListQuery, ResolveBy, RestoreTarget};
use crate::state::AppState;

fn payload<T: Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::from(tk_domain::error::Error::Json(e)))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// sessions.list
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn parse_list(params: &Value) -> Result<ListQuery, RpcError> {
    let mut p = Params::new(params, &["agentId", "limit", "search", "activeMinutes"]);
    let query = ListQuery {
        agent_id: p.opt_str("agentId"),
        limit: p.opt_u64("limit", 1).map(|n| n as usize),
        search: p.opt_str("search"),
        active_minutes: p.opt_u64("activeMinutes", 1),
    };
    p.finish()?;
    Ok(query)
}

pub async fn list(state: &AppState, params: &Value) -> Result<Value, RpcError> {
    let query = parse_list(params)?;
    payload(state.orchestrator.list(query).await?)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// sessions.resolve
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn parse_resolve(params: &Value) -> Result<(ResolveBy, Option<String>), RpcError> {
    let mut p = Params::new(params, &["key", "sessionId", "label", "agentId"]);
    let key = p.opt_str("key");
    let session_id = p.opt_str("sessionId");
    let label = p.opt_str("label");
    let agent_id = p.opt_str("agentId");

    let given = [p.has("key"), p.has("sessionId"), p.has("label")]
        .iter()
        .filter(|b| **b)
        .count();
    if given != 1 {
        p.error("exactly one of `key`, `sessionId`, `label` is required");
    }
    p.finish()?;

    let by = match (key, session_id, label) {
        (Some(k), _, _) => ResolveBy::Key(k),
        (_, Some(id), _) => ResolveBy::SessionId(id),
        (_, _, Some(l)) => ResolveBy::Label(l),
        _ => return Err(RpcError::invalid_request("nothing to resolve")),
    };
    Ok((by, agent_id))
}

pub async fn resolve(state: &AppState, params: &Value) -> Result<Value, RpcError> {
    let (by, agent_id) = parse_resolve(params)?;
    payload(state.orchestrator.resolve(by, agent_id.as_deref()).await?)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// sessions.patch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn parse_patch(params: &Value) -> Result<(String, SessionPatch), RpcError> {
    let mut p = Params::new(
        params,
        &[
            "key",
            "label",
            "thinkingLevel",
            "verboseLevel",
            "reasoningLevel",
            "model",
            "sendPolicy",
            "groupActivation",
        ],
    );
    let key = p.required_str("key");
    let patch = SessionPatch {
        label: p.nullable_str("label"),
        thinking_level: p.nullable_level("thinkingLevel"),
        verbose_level: p.nullable_level("verboseLevel"),
        reasoning_level: p.nullable_level("reasoningLevel"),
        model: p.nullable_str("model"),
        send_policy: p.nullable_choice::<SendPolicy>("sendPolicy", &["allow", "deny"]),
        group_activation: p
            .nullable_choice::<GroupActivation>("groupActivation", &["mention", "always"]),
    };
    p.finish()?;
    let key = key.ok_or_else(|| RpcError::invalid_request("`key` is required"))?;
    Ok((key, patch))
}

pub async fn patch(state: &AppState, params: &Value) -> Result<Value, RpcError> {
    let (key, patch) = parse_patch(params)?;
    payload(state.orchestrator.patch(&key, patch).await?)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// sessions.reset
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_key_only(params: &Value) -> Result<String, RpcError> {
    let mut p = Params::new(params, &["key"]);
    let key = p.required_str("key");
    p.finish()?;
    key.ok_or_else(|| RpcError::invalid_request("`key` is required"))
}

pub async fn reset(state: &AppState, params: &Value) -> Result<Value, RpcError> {
    let key = parse_key_only(params)?;
    payload(state.orchestrator.reset(&key).await?)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// sessions.delete
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn parse_delete(params: &Value) -> Result<(String, bool), RpcError> {
    let mut p = Params::new(params, &["key", "deleteTranscript"]);
    let key = p.required_str("key");
    let delete_transcript = p.opt_bool("deleteTranscript").unwrap_or(true);
    p.finish()?;
    let key = key.ok_or_else(|| RpcError::invalid_request("`key` is required"))?;
    Ok((key, delete_transcript))
}

pub async fn delete(state: &AppState, params: &Value) -> Result<Value, RpcError> {
    let (key, delete_transcript) = parse_delete(params)?;
    payload(state.orchestrator.delete(&key, delete_transcript).await?)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// sessions.compact
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn parse_compact(params: &Value, default_max: usize) -> Result<(String, usize), RpcError> {
    let mut p = Params::new(params, &["key", "maxLines"]);
    let key = p.required_str("key");
    let max_lines = p.opt_floor("maxLines", 1).unwrap_or(default_max);
    p.finish()?;
    let key = key.ok_or_else(|| RpcError::invalid_request("`key` is required"))?;
    Ok((key, max_lines))
}

pub async fn compact(state: &AppState, params: &Value) -> Result<Value, RpcError> {
    let (key, max_lines) = parse_compact(params, state.config.sessions.compact_max_lines)?;
    payload(state.orchestrator.compact(&key, max_lines).await?)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// sessions.abort
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `target` overrides the caller's ambient `key`.
pub fn parse_abort(params: &Value) -> Result<(Option<String>, Option<String>), RpcError> {
    let mut p = Params::new(params, &["key", "target"]);
    let key = p.opt_str("key");
    let target = p.opt_str("target");
    if !p.has("key") && !p.has("target") {
        p.error("one of `target` or `key` is required");
    }
    p.finish()?;
    Ok((target, key))
}

pub async fn abort(state: &AppState, params: &Value) -> Result<Value, RpcError> {
    let (target, key) = parse_abort(params)?;
    payload(
        state
            .orchestrator
            .abort(target.as_deref(), key.as_deref())
            .await?,
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// sessions.archived / sessions.restore
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn archived(state: &AppState, client: &str, params: &Value) -> Result<Value, RpcError> {
    let mut p = Params::new(params, &["agentId"]);
    let agent_id = p.opt_str("agentId");
    p.finish()?;
    payload(state.orchestrator.archived(client, agent_id.as_deref()).await?)
}

pub fn parse_restore(params: &Value) -> Result<RestoreTarget, RpcError> {
    let mut p = Params::new(params, &["path", "index", "listingId"]);
    let path = p.opt_str("path");
    let index = p.opt_u64("index", 1);
    let listing_id = p.opt_str("listingId");

    if p.has("path") == p.has("index") {
        p.error("exactly one of `path` or `index` is required");
    }
    if p.has("path") && p.has("listingId") {
        p.error("`listingId` only applies with `index`");
    }
    p.finish()?;

    match (path, index) {
        (Some(path), _) => Ok(RestoreTarget::Path(PathBuf::from(path))),
        (_, Some(index)) => Ok(RestoreTarget::Index {
            index: index as usize,
            listing_id,
        }),
        _ => Err(RpcError::invalid_request("nothing to restore")),
    }
}

pub async fn restore(state: &AppState, client: &str, params: &Value) -> Result<Value, RpcError> {
    let target = parse_restore(params)?;
    payload(state.orchestrator.restore(client, target).await?)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// gateway.restart
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn restart(state: &AppState, params: &Value) -> Result<Value, RpcError> {
    Params::new(params, &[]).finish()?;
    let mechanism = state.orchestrator.restart().await?;
    Ok(serde_json::json!({ "restarting": true, "mechanism": mechanism }))
}
