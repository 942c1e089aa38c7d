//! End-to-end tests of the `/v1/rpc` session methods against a temp state dir.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tokio::sync::Notify;
use tower::ServiceExt;

use tk_domain::config::Config;
use tk_gateway::api;
use tk_gateway::bootstrap::build_app_state;
use tk_gateway::state::AppState;

fn state_in(dir: &Path, tweak: impl FnOnce(&mut Config)) -> AppState {
    let mut cfg = Config::default();
    cfg.sessions.state_path = dir.join("state");
    tweak(&mut cfg);
    build_app_state(Arc::new(cfg), dir.join("config.toml"), Arc::new(Notify::new())).unwrap()
}

async fn post(state: &AppState, body: String) -> Value {
    let app = api::router().with_state(state.clone());
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/rpc")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn call(state: &AppState, method: &str, params: Value) -> Value {
    let body = json!({ "method": method, "params": params, "client": "tester" });
    post(state, body.to_string()).await
}

async fn ok(state: &AppState, method: &str, params: Value) -> Value {
    let resp = call(state, method, params).await;
    assert_eq!(resp["ok"], true, "{method} failed: {resp}");
    resp["payload"].clone()
}

async fn err(state: &AppState, method: &str, params: Value) -> Value {
    let resp = call(state, method, params).await;
    assert_eq!(resp["ok"], false, "{method} unexpectedly succeeded: {resp}");
    resp["error"].clone()
}

fn sessions_dir(state: &AppState) -> PathBuf {
    state.orchestrator.resolver().sessions_dir("main")
}

fn store_path(state: &AppState) -> PathBuf {
    state.orchestrator.resolver().store_path("main")
}

/// Create `key` and return its session id.
async fn create(state: &AppState, key: &str) -> String {
    let payload = ok(state, "sessions.patch", json!({ "key": key })).await;
    payload["entry"]["sessionId"].as_str().unwrap().to_owned()
}

fn write_lines(path: &Path, n: usize) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let body: String = (0..n).map(|i| format!("{{\"line\":{i}}}\n")).collect();
    std::fs::write(path, body).unwrap();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Envelope
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn health_reports_ok() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(dir.path(), |_| {});
    let resp = api::router()
        .with_state(state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn malformed_and_unknown_requests_are_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(dir.path(), |_| {});

    let resp = post(&state, "{not json".into()).await;
    assert_eq!(resp["ok"], false);
    assert_eq!(resp["error"]["code"], "INVALID_REQUEST");
    assert_eq!(resp["error"]["retryable"], false);

    let e = err(&state, "sessions.frobnicate", json!({})).await;
    assert_eq!(e["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn validation_lists_every_failed_field_and_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(dir.path(), |_| {});

    let e = err(
        &state,
        "sessions.patch",
        json!({
            "key": "work",
            "thinkingLevel": "high",
            "groupActivation": "sometimes",
            "extra": 1,
        }),
    )
    .await;
    assert_eq!(e["code"], "INVALID_REQUEST");
    assert_eq!(e["details"]["errors"].as_array().unwrap().len(), 3);
    let msg = e["message"].as_str().unwrap();
    for field in ["thinkingLevel", "groupActivation", "extra"] {
        assert!(msg.contains(field), "{field} not named in {msg}");
    }
    assert!(!store_path(&state).exists());
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// list / resolve / patch / reset
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn patch_then_list_and_resolve() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(dir.path(), |_| {});

    let patched = ok(
        &state,
        "sessions.patch",
        json!({ "key": "Work", "label": "deploys", "thinkingLevel": 2, "sendPolicy": "deny" }),
    )
    .await;
    assert_eq!(patched["key"], "agent:main:work");
    assert_eq!(patched["created"], true);
    assert_eq!(patched["entry"]["thinkingLevel"], 2);
    assert_eq!(patched["entry"]["sendPolicy"], "deny");

    tokio::time::sleep(Duration::from_millis(5)).await;
    create(&state, "other").await;

    let listed = ok(&state, "sessions.list", json!({})).await;
    assert_eq!(listed["count"], 2);
    assert_eq!(listed["sessions"][0]["key"], "agent:main:other");

    let searched = ok(&state, "sessions.list", json!({ "search": "DEPLOY" })).await;
    assert_eq!(searched["count"], 1);
    assert_eq!(searched["sessions"][0]["key"], "agent:main:work");

    let by_label = ok(&state, "sessions.resolve", json!({ "label": "deploys" })).await;
    assert_eq!(by_label["key"], "agent:main:work");
    assert_eq!(by_label["sessionId"], patched["entry"]["sessionId"]);

    let cleared = ok(&state, "sessions.patch", json!({ "key": "work", "label": null })).await;
    assert_eq!(cleared["created"], false);
    assert!(cleared["entry"].get("label").is_none());

    let e = err(&state, "sessions.resolve", json!({ "label": "deploys" })).await;
    assert_eq!(e["code"], "NOT_FOUND");
}

#[tokio::test]
async fn duplicate_label_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(dir.path(), |_| {});
    ok(&state, "sessions.patch", json!({ "key": "a", "label": "same" })).await;
    let e = err(&state, "sessions.patch", json!({ "key": "b", "label": "same" })).await;
    assert_eq!(e["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn legacy_key_is_migrated_on_resolve() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(dir.path(), |_| {});
    let path = store_path(&state);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(
        &path,
        r#"{"main":{"sessionId":"legacy-1","updatedAt":1767225600000,"label":"old"}}"#,
    )
    .unwrap();

    let resolved = ok(&state, "sessions.resolve", json!({ "key": "main" })).await;
    assert_eq!(resolved["key"], "agent:main:main");
    assert_eq!(resolved["sessionId"], "legacy-1");

    let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let keys: Vec<&String> = raw.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["agent:main:main"]);
    assert_eq!(raw["agent:main:main"]["label"], "old");
}

#[tokio::test]
async fn reset_mints_new_id_and_carries_settings() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(dir.path(), |_| {});
    let mut hook_rx = state.hooks.subscribe();

    let first = ok(
        &state,
        "sessions.patch",
        json!({ "key": "work", "label": "keep", "model": "m-1" }),
    )
    .await;
    state
        .orchestrator
        .store()
        .update(&store_path(&state), |s| {
            let e = s.get_mut("agent:main:work").unwrap();
            e.input_tokens = Some(10);
            e.output_tokens = Some(20);
            e.total_tokens = Some(30);
            e.context_tokens = Some(4096);
            Ok(())
        })
        .await
        .unwrap();

    let reset = ok(&state, "sessions.reset", json!({ "key": "work" })).await;

    assert_ne!(reset["entry"]["sessionId"], first["entry"]["sessionId"]);
    assert_eq!(reset["entry"]["label"], "keep");
    assert_eq!(reset["entry"]["model"], "m-1");
    assert_eq!(reset["entry"]["abortedLastRun"], false);
    assert_eq!(reset["entry"]["contextTokens"], 4096);
    for counter in ["inputTokens", "outputTokens", "totalTokens"] {
        assert!(reset["entry"][counter].is_null(), "{counter} survived reset");
    }

    let raw: Value =
        serde_json::from_str(&std::fs::read_to_string(store_path(&state)).unwrap()).unwrap();
    assert!(raw["agent:main:work"].get("totalTokens").is_none());

    let event = hook_rx.recv().await.unwrap();
    assert_eq!(event.session_key, "agent:main:work");
}

#[tokio::test]
async fn concurrent_patches_lose_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(dir.path(), |_| {});

    let mut tasks = Vec::new();
    for i in 0..24 {
        let state = state.clone();
        tasks.push(tokio::spawn(async move {
            ok(&state, "sessions.patch", json!({ "key": format!("s{i}") })).await;
        }));
    }
    for t in tasks {
        t.await.unwrap();
    }

    let listed = ok(&state, "sessions.list", json!({})).await;
    assert_eq!(listed["count"], 24);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// delete
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn deleting_main_session_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(dir.path(), |_| {});
    for key in ["main", "agent:main:main", "MAIN"] {
        let e = err(&state, "sessions.delete", json!({ "key": key })).await;
        assert_eq!(e["code"], "INVALID_REQUEST", "{key}");
    }
}

#[tokio::test]
async fn delete_archives_transcript_and_clears_queues() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(dir.path(), |_| {});
    let sid = create(&state, "work").await;
    let transcript = sessions_dir(&state).join(format!("{sid}.jsonl"));
    write_lines(&transcript, 3);

    state.queue.enqueue("agent:main:work", "follow-up");
    state.queue.enqueue(&sid, "by id");
    let (_, child) = state.subagents.spawn_for("agent:main:work");

    let deleted = ok(&state, "sessions.delete", json!({ "key": "work" })).await;
    assert_eq!(deleted["deleted"], true);
    let archived = deleted["archived"].as_array().unwrap();
    assert_eq!(archived.len(), 1);
    assert!(archived[0].as_str().unwrap().contains(".jsonl.deleted."));

    assert!(!transcript.exists());
    assert_eq!(state.queue.pending("agent:main:work"), 0);
    assert_eq!(state.queue.pending(&sid), 0);
    assert!(child.is_cancelled());

    let e = err(&state, "sessions.resolve", json!({ "key": "work" })).await;
    assert_eq!(e["code"], "NOT_FOUND");
}

#[tokio::test]
async fn delete_can_keep_transcript() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(dir.path(), |_| {});
    let sid = create(&state, "work").await;
    let transcript = sessions_dir(&state).join(format!("{sid}.jsonl"));
    write_lines(&transcript, 3);

    let deleted = ok(
        &state,
        "sessions.delete",
        json!({ "key": "work", "deleteTranscript": false }),
    )
    .await;
    assert_eq!(deleted["archived"].as_array().unwrap().len(), 0);
    assert!(transcript.exists());
}

#[tokio::test]
async fn delete_waits_for_run_that_ends() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(dir.path(), |_| {});
    let sid = create(&state, "work").await;

    let guard = state.runs.register(&sid);
    let token = guard.token().clone();
    tokio::spawn(async move {
        while !token.is_cancelled() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        drop(guard);
    });

    let deleted = ok(&state, "sessions.delete", json!({ "key": "work" })).await;
    assert_eq!(deleted["deleted"], true);
    assert_eq!(state.runs.active_count(), 0);
}

#[tokio::test]
async fn delete_of_stuck_run_times_out_with_short_wait() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(dir.path(), |c| c.sessions.delete_wait_ms = 50);
    let sid = create(&state, "work").await;
    let _guard = state.runs.register(&sid);

    let e = err(&state, "sessions.delete", json!({ "key": "work" })).await;
    assert_eq!(e["code"], "UNAVAILABLE");
    assert_eq!(e["retryable"], true);

    let still = ok(&state, "sessions.resolve", json!({ "key": "work" })).await;
    assert_eq!(still["sessionId"], sid);
}

#[tokio::test(start_paused = true)]
async fn delete_of_stuck_run_times_out_after_default_wait() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(dir.path(), |_| {});
    assert_eq!(state.config.sessions.delete_wait_ms, 15_000);
    let sid = create(&state, "work").await;
    let before = std::fs::read(store_path(&state)).unwrap();
    let _guard = state.runs.register(&sid);

    let started = tokio::time::Instant::now();
    let e = err(&state, "sessions.delete", json!({ "key": "work" })).await;
    assert_eq!(e["code"], "UNAVAILABLE");
    assert!(started.elapsed() >= Duration::from_millis(15_000));

    assert_eq!(std::fs::read(store_path(&state)).unwrap(), before);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// compact
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn compact_keeps_tail_and_clears_usage() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(dir.path(), |_| {});
    let sid = create(&state, "work").await;
    let transcript = sessions_dir(&state).join(format!("{sid}.jsonl"));
    write_lines(&transcript, 1000);

    state
        .orchestrator
        .store()
        .update(&store_path(&state), |s| {
            let e = s.get_mut("agent:main:work").unwrap();
            e.input_tokens = Some(10);
            e.output_tokens = Some(20);
            e.total_tokens = Some(30);
            e.context_tokens = Some(4096);
            Ok(())
        })
        .await
        .unwrap();

    let compacted = ok(
        &state,
        "sessions.compact",
        json!({ "key": "work", "maxLines": 400 }),
    )
    .await;
    assert_eq!(compacted["compacted"], true);
    assert_eq!(compacted["kept"], 400);
    let archived = PathBuf::from(compacted["archived"].as_str().unwrap());
    assert!(archived.to_string_lossy().contains(".jsonl.bak."));
    assert_eq!(
        std::fs::read_to_string(&archived).unwrap().lines().count(),
        1000
    );

    let kept = std::fs::read_to_string(&transcript).unwrap();
    let lines: Vec<&str> = kept.lines().collect();
    assert_eq!(lines.len(), 400);
    assert_eq!(lines[0], "{\"line\":600}");
    assert_eq!(lines[399], "{\"line\":999}");
    assert!(kept.ends_with('\n'));

    let sessions = state.orchestrator.store().load(&store_path(&state)).await.unwrap();
    let entry = &sessions["agent:main:work"];
    assert_eq!(entry.input_tokens, None);
    assert_eq!(entry.output_tokens, None);
    assert_eq!(entry.total_tokens, None);
    assert_eq!(entry.context_tokens, Some(4096));
}

#[tokio::test]
async fn compact_reports_why_it_did_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(dir.path(), |_| {});

    let none = ok(&state, "sessions.compact", json!({ "key": "ghost" })).await;
    assert_eq!(none["compacted"], false);
    assert_eq!(none["reason"], "no_session");

    let sid = create(&state, "work").await;
    let missing = ok(&state, "sessions.compact", json!({ "key": "work" })).await;
    assert_eq!(missing["reason"], "no_transcript");

    write_lines(&sessions_dir(&state).join(format!("{sid}.jsonl")), 10);
    let small = ok(&state, "sessions.compact", json!({ "key": "work" })).await;
    assert_eq!(small["reason"], "within_budget");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// archived / restore
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn archived_listing_is_newest_first_and_restorable_by_index() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(dir.path(), |_| {});
    let sdir = sessions_dir(&state);
    std::fs::create_dir_all(&sdir).unwrap();
    std::fs::write(sdir.join("older.jsonl.deleted.2026-01-01T00-00-00Z"), "a\n").unwrap();
    std::fs::write(sdir.join("newer.jsonl.deleted.2026-01-02T00-00-00Z"), "b\n").unwrap();
    std::fs::write(sdir.join("notes.txt"), "ignored").unwrap();

    let listed = ok(&state, "sessions.archived", json!({})).await;
    let rows = listed["archived"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["index"], 1);
    assert_eq!(rows[0]["sessionId"], "newer");
    assert_eq!(rows[0]["deletedAt"], "2026-01-02T00-00-00Z");
    assert_eq!(rows[1]["sessionId"], "older");

    let listing_id = listed["listingId"].clone();
    let restored = ok(
        &state,
        "sessions.restore",
        json!({ "index": 2, "listingId": listing_id }),
    )
    .await;
    assert_eq!(restored["sessionId"], "older");
    assert_eq!(std::fs::read_to_string(sdir.join("older.jsonl")).unwrap(), "a\n");
    assert!(!sdir.join("older.jsonl.deleted.2026-01-01T00-00-00Z").exists());

    let e = err(&state, "sessions.restore", json!({ "index": 5 })).await;
    assert_eq!(e["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn delete_then_restore_round_trip_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(dir.path(), |_| {});
    let sid = create(&state, "work").await;
    let transcript = sessions_dir(&state).join(format!("{sid}.jsonl"));
    write_lines(&transcript, 25);
    let original = std::fs::read(&transcript).unwrap();

    let deleted = ok(&state, "sessions.delete", json!({ "key": "work" })).await;
    let archived = deleted["archived"][0].as_str().unwrap().to_owned();

    let restored = ok(&state, "sessions.restore", json!({ "path": archived })).await;
    assert_eq!(restored["sessionId"], sid.as_str());
    assert!(restored["replaced"].is_null());
    assert_eq!(restored["sourceRemoved"], true);
    assert_eq!(std::fs::read(&transcript).unwrap(), original);

    let actives: Vec<_> = std::fs::read_dir(sessions_dir(&state))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".jsonl"))
        .collect();
    assert_eq!(actives.len(), 1);
}

#[tokio::test]
async fn restore_rejects_foreign_and_missing_paths() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(dir.path(), |_| {});

    let outside = dir.path().join("x.jsonl.deleted.2026-01-01T00-00-00Z");
    std::fs::write(&outside, "x").unwrap();
    let e = err(&state, "sessions.restore", json!({ "path": outside })).await;
    assert_eq!(e["code"], "INVALID_REQUEST");

    std::fs::create_dir_all(sessions_dir(&state)).unwrap();
    let bad_name = sessions_dir(&state).join("plain.jsonl");
    std::fs::write(&bad_name, "{}\n").unwrap();
    let e = err(&state, "sessions.restore", json!({ "path": bad_name })).await;
    assert_eq!(e["code"], "INVALID_REQUEST");

    let missing_plain = sessions_dir(&state).join("never-written.jsonl");
    let e = err(&state, "sessions.restore", json!({ "path": missing_plain })).await;
    assert_eq!(e["code"], "NOT_FOUND");

    let gone = sessions_dir(&state).join("gone.jsonl.deleted.2026-01-01T00-00-00Z");
    let e = err(&state, "sessions.restore", json!({ "path": gone })).await;
    assert_eq!(e["code"], "NOT_FOUND");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// abort / restart
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn abort_of_unknown_session_is_remembered_until_creation() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(dir.path(), |_| {});

    let aborted = ok(&state, "sessions.abort", json!({ "key": "later" })).await;
    assert_eq!(aborted["persisted"], false);
    assert_eq!(aborted["runAborted"], false);
    assert!(state.orchestrator.abort_flags().is_set("agent:main:later"));

    let created = ok(&state, "sessions.patch", json!({ "key": "later" })).await;
    assert_eq!(created["entry"]["abortedLastRun"], true);
    assert!(!state.orchestrator.abort_flags().is_set("agent:main:later"));
}

#[tokio::test]
async fn abort_targets_override_and_stops_run() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(dir.path(), |_| {});
    let sid = create(&state, "victim").await;
    let guard = state.runs.register(&sid);
    state.queue.enqueue("agent:main:victim", "queued");
    let (_, child) = state.subagents.spawn_for("agent:main:victim");

    let aborted = ok(
        &state,
        "sessions.abort",
        json!({ "key": "caller", "target": "victim" }),
    )
    .await;
    assert_eq!(aborted["key"], "agent:main:victim");
    assert_eq!(aborted["runAborted"], true);
    assert_eq!(aborted["persisted"], true);
    assert_eq!(aborted["followupsCleared"], 1);
    assert_eq!(aborted["subagentsStopped"], 1);
    assert!(guard.token().is_cancelled());
    assert!(child.is_cancelled());

    let listed = ok(&state, "sessions.list", json!({ "search": "victim" })).await;
    assert_eq!(listed["sessions"][0]["abortedLastRun"], true);
}

#[tokio::test]
async fn restart_is_gated_by_config() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(dir.path(), |_| {});
    let e = err(&state, "gateway.restart", json!({})).await;
    assert_eq!(e["code"], "INVALID_REQUEST");

    let dir = tempfile::tempdir().unwrap();
    let state = state_in(dir.path(), |c| c.gateway.restart_enabled = true);
    let restarted = ok(&state, "gateway.restart", Value::Null).await;
    assert_eq!(restarted["mechanism"], "signal");
    tokio::time::timeout(Duration::from_secs(1), state.restart_tx.notified())
        .await
        .unwrap();
}
