// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

//! Shared helpers for runtime and CLI integration tests.
//!
//! Tests drive `tests/fixtures/fake_agent.py`, a scripted JSON-RPC agent,
//! through the real launch path (`/bin/sh -c`).

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use quickedit::config::RuntimeConfig;
use quickedit::runtime::{AgentRuntime, RuntimeBuilder};
use quickedit::session::launch::shell_quote;
use quickedit_capture::CaptureLog;
use serde_json::{json, Value};
use tempfile::TempDir;

/// Path to the scripted agent.
pub fn fake_agent_script() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/fake_agent.py")
}

/// A scenario file plus the logs the fake agent writes next to it.
pub struct FakeAgent {
    dir: TempDir,
}

impl FakeAgent {
    /// Write `scenario` (see the fake agent's docstring) to a temp dir.
    pub fn new(mut scenario: Value) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let object = scenario.as_object_mut().unwrap();
        object.insert("spawn_log".into(), json!(dir.path().join("spawns.log")));
        object.insert("request_log".into(), json!(dir.path().join("requests.log")));
        std::fs::write(
            dir.path().join("scenario.json"),
            serde_json::to_vec(&scenario).unwrap(),
        )
        .unwrap();
        Self { dir }
    }

    pub fn scenario_path(&self) -> PathBuf {
        self.dir.path().join("scenario.json")
    }

    /// Shell command line that starts this agent.
    pub fn command(&self) -> String {
        format!(
            "python3 {} {}",
            shell_quote(&fake_agent_script().display().to_string()),
            shell_quote(&self.scenario_path().display().to_string())
        )
    }

    /// Config that launches this agent through `/bin/sh` without a login profile.
    pub fn config(&self) -> RuntimeConfig {
        let mut config = RuntimeConfig::default();
        config.agent.command = self.command();
        config.agent.shell = Some(PathBuf::from("/bin/sh"));
        config.agent.login_shell = false;
        config.agent.interactive_shell = false;
        config.turn.timeout_ms = 10_000;
        config
    }

    /// TOML config equivalent to [`FakeAgent::config`], for driving the binary.
    pub fn config_file(&self) -> PathBuf {
        let path = self.dir.path().join("quickedit.toml");
        let toml = format!(
            "[agent]\ncommand = {}\nshell = \"/bin/sh\"\nlogin_shell = false\ninteractive_shell = false\n\n[turn]\ntimeout_ms = 10000\n",
            toml_string(&self.command())
        );
        std::fs::write(&path, toml).unwrap();
        path
    }

    /// Runtime plus the capture log attached to it.
    pub fn runtime(&self) -> (AgentRuntime, CaptureLog) {
        let capture = CaptureLog::new();
        let runtime = RuntimeBuilder::new(self.config())
            .with_capture(capture.clone())
            .build();
        (runtime, capture)
    }

    /// How many agent processes have started.
    pub fn spawn_count(&self) -> usize {
        read_lines(&self.dir.path().join("spawns.log")).len()
    }

    /// Every JSON line the agents read from stdin, in order.
    pub fn requests(&self) -> Vec<Value> {
        read_lines(&self.dir.path().join("requests.log"))
            .iter()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    /// Requests with the given method.
    pub fn requests_for(&self, method: &str) -> Vec<Value> {
        self.requests()
            .into_iter()
            .filter(|r| r["method"] == method)
            .collect()
    }
}

fn toml_string(s: &str) -> String {
    serde_json::to_string(s).unwrap()
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Collects streamed deltas.
#[derive(Clone, Default)]
pub struct DeltaRecorder {
    seen: Arc<Mutex<Vec<String>>>,
}

impl DeltaRecorder {
    pub fn sink(&self) -> impl Fn(&str) + Send + Sync + 'static {
        let seen = Arc::clone(&self.seen);
        move |delta: &str| seen.lock().push(delta.to_string())
    }

    pub fn deltas(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

/// Poll `condition` every 10ms until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Whether `pid` is a live (non-zombie) process.
pub fn process_running(pid: u32) -> bool {
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) else {
        return false;
    };
    // Format: `pid (comm) state ...`; comm may contain spaces.
    stat.rsplit_once(") ")
        .and_then(|(_, rest)| rest.chars().next())
        .is_some_and(|state| state != 'Z' && state != 'X')
}
