// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

//! End-to-end tests for AgentRuntime against the scripted agent.
//!
//! Each test launches `fake_agent.py` through `/bin/sh` exactly as a real
//! agent would be launched, then inspects the run result, the capture log
//! and the requests the agent received.

mod common;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use common::{process_running, wait_until, DeltaRecorder, FakeAgent};
use quickedit::error::RuntimeError;
use quickedit::protocol::ReasoningEffort;
use quickedit::runtime::{AgentRuntime, RunRequest, RuntimeBuilder};
use quickedit::usage::TokenUsage;
use quickedit_capture::Direction;
use serde_json::json;

fn turns(turns: serde_json::Value) -> FakeAgent {
    FakeAgent::new(json!({ "turns": turns }))
}

// =========================================================================
// Successful turns
// =========================================================================

#[tokio::test(flavor = "current_thread")]
async fn streams_deltas_in_order_and_joins_output() {
    let agent = turns(json!([{ "events": [
        { "delta": "Hello" },
        { "delta": ", " },
        { "delta": "world\u{1b}[0m\n" },
        { "complete": "completed" }
    ]}]));
    let (runtime, _capture) = agent.runtime();
    let recorder = DeltaRecorder::default();

    let result = runtime
        .run(RunRequest::new("greet", None).on_delta(recorder.sink()))
        .await
        .unwrap();

    assert_eq!(recorder.deltas(), vec!["Hello", ", ", "world\u{1b}[0m\n"]);
    assert_eq!(result.stdout, "Hello, world");
    assert_eq!(result.stderr, "");
    assert_eq!(result.exit_code, 0);
    assert!(result.success());
}

#[tokio::test(flavor = "current_thread")]
async fn completed_item_fills_output_when_nothing_streamed() {
    let agent = turns(json!([{ "events": [
        { "item": "Rewritten text" },
        { "item": "ignored second item" },
        { "complete": "completed" }
    ]}]));
    let (runtime, _capture) = agent.runtime();
    let recorder = DeltaRecorder::default();

    let result = runtime
        .run(RunRequest::new("fix", Some("txt".into())).on_delta(recorder.sink()))
        .await
        .unwrap();

    assert_eq!(result.stdout, "Rewritten text");
    assert_eq!(recorder.deltas(), vec!["Rewritten text"]);
}

#[tokio::test(flavor = "current_thread")]
async fn token_usage_merges_partial_updates() {
    let agent = turns(json!([{ "events": [
        { "usage": { "inputTokens": 10, "outputTokens": "4", "totalTokens": 14 } },
        { "usage": { "outputTokens": 6, "totalTokens": "bogus" } },
        { "delta": "ok" },
        { "complete": "completed" }
    ]}]));
    let (runtime, _capture) = agent.runtime();

    let result = runtime.run(RunRequest::new("count", None)).await.unwrap();

    assert_eq!(
        result.token_usage,
        Some(TokenUsage::new(Some(10), Some(6), Some(14)))
    );
}

#[tokio::test(flavor = "current_thread")]
async fn empty_delta_is_not_streamed() {
    let agent = turns(json!([{ "events": [
        { "delta": "" },
        { "delta": "x" },
        { "complete": "completed" }
    ]}]));
    let (runtime, _capture) = agent.runtime();
    let recorder = DeltaRecorder::default();

    runtime
        .run(RunRequest::new("x", None).on_delta(recorder.sink()))
        .await
        .unwrap();

    assert_eq!(recorder.deltas(), vec!["x"]);
}

// =========================================================================
// Unsuccessful turns
// =========================================================================

#[tokio::test(flavor = "current_thread")]
async fn failed_turn_reports_turn_error() {
    let agent = turns(json!([{ "events": [
        { "delta": "partial" },
        { "complete": { "status": "failed", "error": "  quota exceeded  " } }
    ]}]));
    let (runtime, _capture) = agent.runtime();

    let result = runtime.run(RunRequest::new("go", None)).await.unwrap();

    assert_eq!(result.exit_code, 1);
    assert_eq!(result.stdout, "partial");
    assert_eq!(result.stderr, "quota exceeded");
    assert!(runtime.is_session_alive());
}

#[tokio::test(flavor = "current_thread")]
async fn stashed_error_notification_explains_failed_turn() {
    let agent = turns(json!([{ "events": [
        { "error": "stream disconnected" },
        { "complete": "failed" }
    ]}]));
    let (runtime, _capture) = agent.runtime();

    let result = runtime.run(RunRequest::new("go", None)).await.unwrap();

    assert_eq!(result.exit_code, 1);
    assert_eq!(result.stderr, "stream disconnected");
}

#[tokio::test(flavor = "current_thread")]
async fn missing_status_counts_as_failed() {
    let agent = turns(json!([{ "events": [{ "complete": {} }] }]));
    let (runtime, _capture) = agent.runtime();

    let result = runtime.run(RunRequest::new("go", None)).await.unwrap();

    assert_eq!(result.exit_code, 1);
    assert_eq!(result.stderr, "turn failed.");
}

#[tokio::test(flavor = "current_thread")]
async fn non_string_status_settles_as_failed() {
    let agent = turns(json!([{ "events": [{ "delta": "partial" }, { "complete": { "status": 5 } }] }]));
    let (runtime, _capture) = agent.runtime();

    let result = runtime
        .run(RunRequest::new("go", None).timeout(Duration::from_secs(5)))
        .await
        .unwrap();

    assert_eq!(result.exit_code, 1);
    assert_eq!(result.stdout, "partial");
    assert_eq!(result.stderr, "turn failed.");
    assert!(runtime.is_session_alive());
}

#[tokio::test(flavor = "current_thread")]
async fn interrupted_status_without_error_is_named() {
    let agent = turns(json!([{ "events": [{ "complete": "interrupted" }] }]));
    let (runtime, _capture) = agent.runtime();

    let result = runtime.run(RunRequest::new("go", None)).await.unwrap();

    assert_eq!(result.stderr, "turn interrupted.");
}

// =========================================================================
// Session lifecycle
// =========================================================================

#[tokio::test(flavor = "current_thread")]
async fn session_is_reused_across_turns() {
    let agent = turns(json!([{}, {}, {}]));
    let (runtime, capture) = agent.runtime();

    for prompt in ["a", "b", "c"] {
        runtime.run(RunRequest::new(prompt, None)).await.unwrap();
    }

    assert_eq!(agent.spawn_count(), 1);
    assert_eq!(
        capture.outgoing_methods(),
        vec![
            "initialize",
            "initialized",
            "thread/start",
            "turn/start",
            "turn/start",
            "turn/start"
        ]
    );
}

#[tokio::test(flavor = "current_thread")]
async fn prewarm_handshakes_once() {
    let agent = turns(json!([{}]));
    let (runtime, _capture) = agent.runtime();

    runtime.prewarm(None).await;
    assert!(runtime.is_session_alive());
    assert_eq!(runtime.thread_id().as_deref(), Some("thread-1"));

    runtime.run(RunRequest::new("go", None)).await.unwrap();

    assert_eq!(agent.spawn_count(), 1);
    assert_eq!(agent.requests_for("initialize").len(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn prewarm_swallows_launch_errors() {
    let agent = FakeAgent::new(json!({}));
    let mut config = agent.config();
    config.agent.shell = Some(PathBuf::from("/nonexistent/shell"));
    let runtime = AgentRuntime::new(config);

    runtime.prewarm(None).await;

    assert!(!runtime.is_session_alive());
}

#[tokio::test(flavor = "current_thread")]
async fn handshake_sends_client_info_and_thread_model() {
    let agent = turns(json!([{}]));
    let mut config = agent.config();
    config.client.name = "quickedit-tests".into();
    config.turn.model = Some("gpt-test".into());
    let runtime = AgentRuntime::new(config);

    runtime.run(RunRequest::new("go", None)).await.unwrap();

    let initialize = &agent.requests_for("initialize")[0];
    assert_eq!(initialize["id"], 100);
    assert_eq!(initialize["params"]["clientInfo"]["name"], "quickedit-tests");
    let initialized = &agent.requests_for("initialized")[0];
    assert!(initialized.get("id").is_none());
    let thread = &agent.requests_for("thread/start")[0];
    assert_eq!(thread["params"]["model"], "gpt-test");
}

#[tokio::test(flavor = "current_thread")]
async fn turn_start_carries_prompt_model_and_effort() {
    let agent = turns(json!([{}]));
    let (runtime, _capture) = agent.runtime();

    runtime
        .run(
            RunRequest::new("make it formal", Some("hey there".into()))
                .model("  gpt-edit  ")
                .effort(ReasoningEffort::Low),
        )
        .await
        .unwrap();

    let start = &agent.requests_for("turn/start")[0];
    let params = &start["params"];
    assert_eq!(params["threadId"], "thread-1");
    assert_eq!(params["model"], "gpt-edit");
    assert_eq!(params["effort"], "low");
    assert_eq!(params["input"][0]["type"], "text");
    let text = params["input"][0]["text"].as_str().unwrap();
    assert!(text.contains("make it formal"));
    assert!(text.contains("hey there"));
}

#[tokio::test(flavor = "current_thread")]
async fn custom_composer_text_is_sent_verbatim() {
    let agent = turns(json!([{}]));
    let runtime = RuntimeBuilder::new(agent.config())
        .with_composer(|request: &quickedit::prompt::PromptRequest| {
            format!("CUSTOM:{}", request.command)
        })
        .build();

    runtime.run(RunRequest::new("hi", None)).await.unwrap();

    let start = &agent.requests_for("turn/start")[0];
    assert_eq!(start["params"]["input"][0]["text"], "CUSTOM:hi");
}

#[tokio::test(flavor = "current_thread")]
async fn timeout_tears_down_and_removes_stderr_file() {
    let agent = FakeAgent::new(json!({
        "stderr_on_start": ["booting"],
        "turns": [{ "events": [{ "delta": "slow" }] }]
    }));
    let (runtime, _capture) = agent.runtime();
    runtime.prewarm(None).await;
    let stderr_path = runtime.stderr_path().unwrap();
    let pid = runtime.agent_pid().unwrap();
    assert!(stderr_path.exists());
    assert!(process_running(pid));

    let err = runtime
        .run(RunRequest::new("go", None).timeout(Duration::from_millis(300)))
        .await
        .unwrap_err();

    assert_eq!(err, RuntimeError::TimedOut(Duration::from_millis(300)));
    assert!(!runtime.is_session_alive());
    assert_eq!(runtime.agent_pid(), None);
    assert!(!stderr_path.exists());
    assert_eq!(runtime.pending_request_count(), 0);
    assert!(wait_until(Duration::from_secs(5), || !process_running(pid)).await);
}

#[tokio::test(flavor = "current_thread")]
async fn run_after_timeout_respawns() {
    let agent = turns(json!([{ "events": [{ "delta": "slow" }] }]));
    let (runtime, capture) = agent.runtime();

    runtime
        .run(RunRequest::new("go", None).timeout(Duration::from_secs(1)))
        .await
        .unwrap_err();
    runtime
        .run(RunRequest::new("go", None).timeout(Duration::from_secs(1)))
        .await
        .unwrap_err();

    assert_eq!(agent.spawn_count(), 2);
    assert_eq!(runtime.sessions_started(), 2);
    // Request ids restart with every process.
    assert_eq!(agent.requests_for("initialize")[1]["id"], 100);
    assert!(!capture.session(2).is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn concurrent_run_fails_fast() {
    let agent = turns(json!([{ "events": [{ "delta": "x" }, { "sleep_ms": 400 }, { "complete": "completed" }] }]));
    let (runtime, _capture) = agent.runtime();
    let runtime = Arc::new(runtime);

    let first = tokio::spawn({
        let runtime = Arc::clone(&runtime);
        async move { runtime.run(RunRequest::new("first", None)).await }
    });
    assert!(wait_until(Duration::from_secs(5), || runtime.has_active_turn()).await);

    let err = runtime
        .run(RunRequest::new("second", None))
        .await
        .unwrap_err();
    assert_eq!(err, RuntimeError::turn_already_running());

    let result = first.await.unwrap().unwrap();
    assert_eq!(result.stdout, "x");
    assert_eq!(agent.spawn_count(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn cancel_rejects_running_turn() {
    let agent = turns(json!([{ "events": [{ "delta": "x" }] }]));
    let (runtime, _capture) = agent.runtime();
    let runtime = Arc::new(runtime);

    let task = tokio::spawn({
        let runtime = Arc::clone(&runtime);
        async move { runtime.run(RunRequest::new("go", None)).await }
    });
    assert!(wait_until(Duration::from_secs(5), || runtime.has_active_turn()).await);
    runtime.cancel();

    let err = task.await.unwrap().unwrap_err();
    assert_eq!(err.to_string(), "Cancelled by user.");
    assert!(!runtime.is_session_alive());
}

#[tokio::test(flavor = "current_thread")]
async fn cancel_without_session_is_noop() {
    let agent = FakeAgent::new(json!({}));
    let (runtime, _capture) = agent.runtime();

    runtime.cancel();
    runtime.dispose();

    assert_eq!(agent.spawn_count(), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn dispose_is_idempotent_and_runtime_respawns() {
    let agent = turns(json!([{}]));
    let (runtime, _capture) = agent.runtime();
    runtime.run(RunRequest::new("a", None)).await.unwrap();

    runtime.dispose();
    runtime.dispose();
    assert!(!runtime.is_session_alive());

    let result = runtime.run(RunRequest::new("b", None)).await.unwrap();
    assert_eq!(result.stdout, "ok");
    assert_eq!(agent.spawn_count(), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn dropping_runtime_kills_agent() {
    let agent = turns(json!([{ "events": [{ "delta": "x" }] }]));
    let (runtime, _capture) = agent.runtime();
    runtime.prewarm(None).await;
    let stderr_path = runtime.stderr_path().unwrap();
    let pid = runtime.agent_pid().unwrap();

    drop(runtime);

    assert!(!stderr_path.exists());
    assert!(wait_until(Duration::from_secs(5), || !process_running(pid)).await);
}

#[tokio::test(flavor = "current_thread")]
async fn silent_agent_handshake_times_out() {
    let agent = FakeAgent::new(json!({ "silent": true }));
    let (runtime, _capture) = agent.runtime();
    let runtime = Arc::new(runtime);
    let timeout = Duration::from_millis(500);

    let task = tokio::spawn({
        let runtime = Arc::clone(&runtime);
        async move { runtime.run(RunRequest::new("go", None).timeout(timeout)).await }
    });
    assert!(wait_until(Duration::from_secs(5), || runtime.agent_pid().is_some()).await);
    let pid = runtime.agent_pid().unwrap();

    let err = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("run ignored its timeout during the handshake")
        .unwrap()
        .unwrap_err();

    assert_eq!(err, RuntimeError::TimedOut(timeout));
    assert!(!runtime.is_session_alive());
    assert_eq!(runtime.pending_request_count(), 0);
    assert!(agent.requests_for("thread/start").is_empty());
    assert!(wait_until(Duration::from_secs(5), || !process_running(pid)).await);

    // The lifecycle lock is free again: the next call spawns and times out too.
    let err = tokio::time::timeout(
        Duration::from_secs(5),
        runtime.run(RunRequest::new("go", None).timeout(timeout)),
    )
    .await
    .expect("second run blocked behind the first handshake")
    .unwrap_err();
    assert!(err.is_timed_out());
    assert_eq!(runtime.sessions_started(), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn dropped_run_future_cancels_session() {
    let agent = turns(json!([{ "events": [{ "delta": "x" }] }]));
    let (runtime, _capture) = agent.runtime();

    let raced = tokio::time::timeout(
        Duration::from_millis(1500),
        runtime.run(RunRequest::new("go", None)),
    )
    .await;

    assert!(raced.is_err());
    assert!(!runtime.has_active_turn());
    assert!(!runtime.is_session_alive());
}

// =========================================================================
// Process failures
// =========================================================================

#[tokio::test(flavor = "current_thread")]
async fn exit_mid_turn_surfaces_stderr_summary() {
    let agent = turns(json!([{ "events": [
        { "stderr": "2026-01-01 INFO starting stream" },
        { "stderr": "Error: unexpected status 401 Unauthorized" },
        { "exit": 1 }
    ]}]));
    let (runtime, capture) = agent.runtime();

    let err = runtime.run(RunRequest::new("go", None)).await.unwrap_err();

    assert_eq!(
        err,
        RuntimeError::Protocol("Error: unexpected status 401 Unauthorized".into())
    );
    assert!(!runtime.is_session_alive());
    assert_eq!(capture.count(|f| f.direction == Direction::Stderr), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn exit_mid_turn_prefers_json_detail() {
    let agent = turns(json!([{ "events": [
        { "stderr": r#"request failed: {"detail":"The model `x` does not exist"}"# },
        { "exit": 1 }
    ]}]));
    let (runtime, _capture) = agent.runtime();

    let err = runtime.run(RunRequest::new("go", None)).await.unwrap_err();

    assert_eq!(err.to_string(), "The model `x` does not exist");
}

#[tokio::test(flavor = "current_thread")]
async fn exit_without_stderr_reports_process_exit() {
    let agent = turns(json!([{ "events": [{ "exit": 0 }] }]));
    let (runtime, _capture) = agent.runtime();

    let err = runtime.run(RunRequest::new("go", None)).await.unwrap_err();

    assert_eq!(err.to_string(), "agent process exited");
}

#[tokio::test(flavor = "current_thread")]
async fn turn_start_error_is_protocol_error() {
    let agent = turns(json!([{ "start_error": "model not supported" }]));
    let (runtime, _capture) = agent.runtime();

    let err = runtime.run(RunRequest::new("go", None)).await.unwrap_err();

    assert_eq!(err, RuntimeError::Protocol("model not supported".into()));
    assert!(!runtime.is_session_alive());
    assert!(!runtime.has_active_turn());
}

#[tokio::test(flavor = "current_thread")]
async fn launch_failure_is_reported() {
    let agent = FakeAgent::new(json!({}));
    let mut config = agent.config();
    config.agent.shell = Some(PathBuf::from("/nonexistent/shell"));
    let runtime = AgentRuntime::new(config);

    let err = runtime.run(RunRequest::new("go", None)).await.unwrap_err();

    assert!(matches!(err, RuntimeError::LaunchFailed(_)), "{err:?}");
    assert_eq!(runtime.sessions_started(), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn missing_command_exits_and_fails_handshake() {
    let agent = FakeAgent::new(json!({}));
    let mut config = agent.config();
    config.agent.command = "quickedit-no-such-agent-binary".into();
    let runtime = AgentRuntime::new(config);

    let err = runtime.run(RunRequest::new("go", None)).await.unwrap_err();

    assert!(matches!(err, RuntimeError::Protocol(_)), "{err:?}");
    assert!(!runtime.is_session_alive());
}

#[tokio::test(flavor = "current_thread")]
async fn initialize_error_tears_down() {
    let agent = FakeAgent::new(json!({ "initialize_error": "unsupported client" }));
    let (runtime, _capture) = agent.runtime();

    let err = runtime.run(RunRequest::new("go", None)).await.unwrap_err();

    assert_eq!(err, RuntimeError::Protocol("unsupported client".into()));
    assert!(!runtime.is_session_alive());
    assert!(agent.requests_for("thread/start").is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn missing_thread_id_fails_handshake() {
    let agent = FakeAgent::new(json!({ "omit_thread_id": true }));
    let (runtime, _capture) = agent.runtime();

    let err = runtime.run(RunRequest::new("go", None)).await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "thread/start response missing thread.id"
    );
    assert!(agent.requests_for("turn/start").is_empty());
}

// =========================================================================
// Wire robustness
// =========================================================================

#[tokio::test(flavor = "current_thread")]
async fn noise_and_unknown_responses_are_ignored() {
    let agent = turns(json!([{ "events": [
        { "raw": "" },
        { "raw": "not json at all" },
        { "raw": "[1, 2, 3]" },
        { "raw": r#"{"jsonrpc":"2.0","id":9999,"result":{}}"# },
        { "raw": r#"{"jsonrpc":"2.0","id":"abc","result":{}}"# },
        { "notify": { "method": "codex/event/unknown", "params": { "x": 1 } } },
        { "delta": "fine" },
        { "complete": "completed" }
    ]}]));
    let (runtime, _capture) = agent.runtime();

    let result = runtime.run(RunRequest::new("go", None)).await.unwrap();

    assert_eq!(result.stdout, "fine");
}

#[tokio::test(flavor = "current_thread")]
async fn malformed_notification_is_skipped() {
    let agent = turns(json!([{ "events": [
        { "notify": { "method": "item/agentMessage/delta", "params": { "delta": 5 } } },
        { "delta": "kept" },
        { "complete": "completed" }
    ]}]));
    let (runtime, _capture) = agent.runtime();

    let result = runtime.run(RunRequest::new("go", None)).await.unwrap();

    assert_eq!(result.stdout, "kept");
}

#[tokio::test(flavor = "current_thread")]
async fn notifications_for_other_turns_are_filtered() {
    let agent = turns(json!([{ "events": [
        { "notify": { "method": "item/agentMessage/delta", "params": {
            "threadId": "thread-1", "turnId": "turn-other", "itemId": "i", "delta": "foreign"
        } } },
        { "notify": { "method": "item/agentMessage/delta", "params": {
            "threadId": "thread-other", "itemId": "i", "delta": "foreign"
        } } },
        { "notify": { "method": "item/agentMessage/delta", "params": {
            "itemId": "i", "delta": "wild "
        } } },
        { "delta": "mine" },
        { "notify": { "method": "turn/completed", "params": {
            "threadId": "thread-other", "turn": { "id": "turn-1", "status": "completed" }
        } } },
        { "complete": "completed" }
    ]}]));
    let (runtime, _capture) = agent.runtime();

    let result = runtime.run(RunRequest::new("go", None)).await.unwrap();

    assert_eq!(result.stdout, "wild mine");
}

#[tokio::test(flavor = "current_thread")]
async fn turn_without_id_in_response_still_completes() {
    let agent = turns(json!([{ "omit_turn_id": true }]));
    let (runtime, _capture) = agent.runtime();

    let result = runtime.run(RunRequest::new("go", None)).await.unwrap();

    assert_eq!(result.stdout, "ok");
}

#[tokio::test(flavor = "current_thread")]
async fn capture_file_records_every_line() {
    let agent = turns(json!([{}]));
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wire.jsonl");
    let runtime = RuntimeBuilder::new(agent.config())
        .with_capture_file(&path)
        .unwrap()
        .build();

    runtime.run(RunRequest::new("go", None)).await.unwrap();

    let lines = std::fs::read_to_string(&path).unwrap();
    let frames: Vec<serde_json::Value> = lines
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert!(frames.iter().any(|f| f["direction"] == "outgoing"));
    assert!(frames.iter().any(|f| f["direction"] == "incoming"));
    assert!(frames.iter().all(|f| f["session"] == 1));
}
