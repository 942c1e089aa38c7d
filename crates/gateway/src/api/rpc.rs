//! `POST /v1/rpc` envelope.
//!
//! Request: `{method, params?, client?}`.  Response (always HTTP 200):
//! `{ok: true, payload}` or `{ok: false, error: {code, message, retryable,
//! details?}}`.

use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::Instrument;

use super::error::{RpcError, ERROR_INVALID_REQUEST};
use super::sessions;
use crate::state::AppState;

/// Client id used for listing memory when the caller does not send one.
pub const DEFAULT_CLIENT: &str = "default";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RpcRequest {
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default)]
    pub client: Option<String>,
}

pub async fn rpc(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let req: RpcRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return Json(envelope(Err(RpcError::invalid_request(format!(
                "malformed rpc request: {e}"
            )))));
        }
    };
    let client = req
        .client
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CLIENT)
        .to_owned();

    let span = tracing::info_span!("rpc", method = %req.method, client = %client);
    let result = dispatch(&state, &req.method, &client, &req.params)
        .instrument(span)
        .await;
    if let Err(e) = &result {
        if e.code == ERROR_INVALID_REQUEST {
            tracing::debug!(method = %req.method, code = e.code, message = %e.message, "rpc rejected");
        } else {
            tracing::warn!(method = %req.method, code = e.code, message = %e.message, "rpc failed");
        }
    }
    Json(envelope(result))
}

/// Route one call to its method handler.
pub async fn dispatch(
    state: &AppState,
    method: &str,
    client: &str,
    params: &Value,
) -> Result<Value, RpcError> {
    match method {
        "sessions.list" => sessions::list(state, params).await,
        "sessions.resolve" => sessions::resolve(state, params).await,
        "sessions.patch" => sessions::patch(state, params).await,
        "sessions.reset" => sessions::reset(state, params).await,
        "sessions.delete" => sessions::delete(state, params).await,
        "sessions.compact" => sessions::compact(state, params).await,
        "sessions.abort" => sessions::abort(state, params).await,
        "sessions.archived" => sessions::archived(state, client, params).await,
        "sessions.restore" => sessions::restore(state, client, params).await,
        "gateway.restart" => sessions::restart(state, params).await,
        other => Err(RpcError::invalid_request(format!("unknown method: {other}"))),
    }
}

pub fn envelope(result: Result<Value, RpcError>) -> Value {
    match result {
        Ok(payload) => json!({ "ok": true, "payload": payload }),
        Err(error) => json!({ "ok": false, "error": error }),
    }
}
