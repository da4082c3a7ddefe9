// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The runtime client.
//!
//! All session state sits behind one `parking_lot` mutex that is never held
//! across an await. The stdout reader task takes the same lock per line, so
//! request routing, turn updates and teardown are serialized. Session
//! creation is additionally serialized by an async lifecycle lock so two
//! callers never spawn two agents.

use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use quickedit_capture::{CaptureLog, Direction};
use serde::Serialize;
use serde_json::Value;
use tokio::process::ChildStdout;
use tokio::task::JoinHandle;

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::prompt::{DefaultComposer, PromptComposer};
use crate::protocol::{
    method, thread_id_from_result, turn_id_from_result, InitializeParams, ReasoningEffort,
    ThreadStartParams, TurnStartParams,
};
use crate::session::{self, LaunchCommand, LineReader, Session};
use crate::stderr::summarize;
use crate::turn::{TurnOutcome, TurnResult};
use crate::wire::{JsonRpcNotification, JsonRpcRequest};

use super::request::{RunRequest, RunResult};

#[derive(Default)]
struct SessionSlot {
    session: Option<Session>,
    generation: u64,
}

struct Inner {
    slot: Mutex<SessionSlot>,
    lifecycle: tokio::sync::Mutex<()>,
}

impl Inner {
    /// Tear down whatever session exists. Returns false if there was none.
    fn teardown(&self, cause: &RuntimeError) -> bool {
        let session = self.slot.lock().session.take();
        match session {
            Some(session) => {
                session.teardown(cause);
                true
            }
            None => false,
        }
    }

    /// Tear down only if the current session is still `generation`.
    fn teardown_generation(&self, generation: u64, cause: &RuntimeError) -> bool {
        let session = {
            let mut slot = self.slot.lock();
            match &slot.session {
                Some(s) if s.generation() == generation => slot.session.take(),
                _ => None,
            }
        };
        match session {
            Some(session) => {
                session.teardown(cause);
                true
            }
            None => false,
        }
    }

    /// Run `f` against the session if it is still `generation`.
    fn with_generation<T>(
        &self,
        generation: u64,
        f: impl FnOnce(&mut Session) -> T,
    ) -> Option<T> {
        let mut slot = self.slot.lock();
        slot.session
            .as_mut()
            .filter(|s| s.generation() == generation)
            .map(f)
    }
}

/// Client for one long-lived agent subprocess.
///
/// At most one turn runs at a time; a second concurrent [`run`](Self::run)
/// fails immediately. Every failure path tears the session down, and the
/// next call respawns the agent and repeats the handshake.
pub struct AgentRuntime {
    config: RuntimeConfig,
    composer: Arc<dyn PromptComposer>,
    capture: Option<CaptureLog>,
    inner: Arc<Inner>,
}

impl AgentRuntime {
    /// A runtime with the default prompt composer and no capture.
    pub fn new(config: RuntimeConfig) -> Self {
        Self::from_parts(config, Arc::new(DefaultComposer), None)
    }

    pub(crate) fn from_parts(
        config: RuntimeConfig,
        composer: Arc<dyn PromptComposer>,
        capture: Option<CaptureLog>,
    ) -> Self {
        Self {
            config,
            composer,
            capture,
            inner: Arc::new(Inner {
                slot: Mutex::new(SessionSlot::default()),
                lifecycle: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn capture(&self) -> Option<&CaptureLog> {
        self.capture.as_ref()
    }

    // =========================================================================
    // Public operations
    // =========================================================================

    /// Start the agent and handshake ahead of the first turn.
    ///
    /// The handshake is bounded by the configured turn timeout. Errors are
    /// logged and dropped; a later `run()` retries from scratch.
    pub async fn prewarm(&self, model: Option<&str>) {
        let model = model.or(self.config.turn.model.as_deref());
        if let Err(e) = self.ensure_session(model, self.config.turn.timeout()).await {
            tracing::debug!(error = %e, "prewarm failed");
        }
    }

    /// Run one turn to completion.
    ///
    /// `timeout` bounds the handshake of a fresh session and, separately,
    /// the turn from `turn/start` to completion.
    pub async fn run(&self, request: RunRequest) -> Result<RunResult, RuntimeError> {
        let prompt = self.composer.compose(&request.prompt);
        let model = request
            .model
            .as_deref()
            .or(self.config.turn.model.as_deref());
        let effort = request.effort.or(self.config.turn.effort);
        let timeout = request.timeout.unwrap_or_else(|| self.config.turn.timeout());

        self.ensure_session(model, timeout).await?;

        let (generation, thread_id, completion) = {
            let mut slot = self.inner.slot.lock();
            let session = slot
                .session
                .as_mut()
                .filter(|s| s.is_ready())
                .ok_or_else(RuntimeError::process_not_running)?;
            let thread_id = session
                .thread_id()
                .map(str::to_string)
                .ok_or_else(RuntimeError::process_not_running)?;
            let completion = session
                .turn_mut()
                .begin(thread_id.clone(), request.on_delta.clone())?;
            (session.generation(), thread_id, completion)
        };
        tracing::debug!(generation, %thread_id, ?timeout, "turn starting");

        let guard = DropGuard::new(&self.inner, generation);
        let raced = tokio::time::timeout(
            timeout,
            self.drive_turn(generation, thread_id, prompt, model, effort, completion),
        )
        .await;
        guard.disarm();

        match raced {
            Ok(Ok(outcome)) => Ok(RunResult::from(outcome)),
            Err(_elapsed) => {
                let err = RuntimeError::TimedOut(timeout);
                self.inner.teardown_generation(generation, &err);
                Err(err)
            }
            Ok(Err(err)) if err.is_cancelled() || err.is_timed_out() => {
                self.inner.teardown_generation(generation, &err);
                Err(err)
            }
            Ok(Err(err)) => {
                let snapshot = self
                    .inner
                    .with_generation(generation, |s| s.stderr_snapshot())
                    .unwrap_or_default();
                if let Some(capture) = &self.capture {
                    if !snapshot.is_empty() {
                        capture.record(generation, Direction::Stderr, snapshot.clone());
                    }
                }
                self.inner.teardown_generation(generation, &err);
                match summarize(&snapshot) {
                    Some(summary) => Err(RuntimeError::Protocol(summary)),
                    None => Err(err),
                }
            }
        }
    }

    /// Cancel the active turn (if any) and tear down the session.
    pub fn cancel(&self) {
        if self.inner.teardown(&RuntimeError::cancelled_by_user()) {
            tracing::debug!("session cancelled");
        }
    }

    /// Tear down the session. The runtime stays usable; the next `run()`
    /// respawns the agent.
    pub fn dispose(&self) {
        if self.inner.teardown(&RuntimeError::disposed()) {
            tracing::debug!("session disposed");
        }
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn is_session_alive(&self) -> bool {
        self.inner
            .slot
            .lock()
            .session
            .as_ref()
            .is_some_and(Session::is_alive)
    }

    /// Pid of the current agent process, if it is still running.
    pub fn agent_pid(&self) -> Option<u32> {
        self.inner.slot.lock().session.as_ref().and_then(Session::pid)
    }

    pub fn thread_id(&self) -> Option<String> {
        self.inner
            .slot
            .lock()
            .session
            .as_ref()
            .and_then(|s| s.thread_id().map(str::to_string))
    }

    pub fn pending_request_count(&self) -> usize {
        self.inner
            .slot
            .lock()
            .session
            .as_ref()
            .map_or(0, |s| s.pending().len())
    }

    pub fn has_active_turn(&self) -> bool {
        self.inner
            .slot
            .lock()
            .session
            .as_ref()
            .is_some_and(|s| s.turn().is_active())
    }

    /// Stderr written by the current agent so far. Empty if there is no session.
    pub fn stderr_snapshot(&self) -> String {
        self.inner
            .slot
            .lock()
            .session
            .as_ref()
            .map(Session::stderr_snapshot)
            .unwrap_or_default()
    }

    /// Path of the current session's stderr capture file.
    pub fn stderr_path(&self) -> Option<PathBuf> {
        self.inner
            .slot
            .lock()
            .session
            .as_ref()
            .map(|s| s.stderr_path().to_path_buf())
    }

    /// Number of sessions spawned so far.
    pub fn sessions_started(&self) -> u64 {
        self.inner.slot.lock().generation
    }

    // =========================================================================
    // Session lifecycle
    // =========================================================================

    async fn ensure_session(
        &self,
        model: Option<&str>,
        handshake_timeout: Duration,
    ) -> Result<(), RuntimeError> {
        let _lifecycle = self.inner.lifecycle.lock().await;

        let stale = {
            let slot = self.inner.slot.lock();
            match &slot.session {
                Some(s) if s.is_ready() => return Ok(()),
                Some(_) => true,
                None => false,
            }
        };
        if stale {
            self.inner.teardown(&RuntimeError::session_restarted());
        }

        let generation = self.start_session()?;
        let handshake = tokio::time::timeout(handshake_timeout, self.handshake(generation, model))
            .await
            .unwrap_or_else(|_elapsed| Err(RuntimeError::TimedOut(handshake_timeout)));
        match handshake {
            Ok(thread_id) => {
                tracing::debug!(generation, %thread_id, "session ready");
                self.inner
                    .with_generation(generation, |s| s.set_thread_id(thread_id))
                    .ok_or_else(RuntimeError::process_not_running)
            }
            Err(err) => {
                self.inner.teardown_generation(generation, &err);
                Err(err)
            }
        }
    }

    fn start_session(&self) -> Result<u64, RuntimeError> {
        let launch = LaunchCommand::from_config(&self.config.agent);
        let agent = session::spawn(&launch)?;

        let mut slot = self.inner.slot.lock();
        slot.generation += 1;
        let generation = slot.generation;
        let mut session = Session::new(
            generation,
            agent.child,
            agent.stdin,
            agent.stderr,
            self.capture.clone(),
        );
        tracing::debug!(generation, pid = ?session.pid(), "agent spawned");
        session.attach_reader(spawn_reader(
            Arc::downgrade(&self.inner),
            generation,
            agent.stdout,
        ));
        slot.session = Some(session);
        Ok(generation)
    }

    async fn handshake(
        &self,
        generation: u64,
        model: Option<&str>,
    ) -> Result<String, RuntimeError> {
        let initialize = InitializeParams {
            client_info: self.config.client.clone(),
            ..Default::default()
        };
        self.send_request(generation, method::INITIALIZE, Some(to_params(&initialize)?))
            .await?;
        self.send_notification(generation, method::INITIALIZED, None)
            .await?;

        let thread = ThreadStartParams::new(model);
        let result = self
            .send_request(generation, method::THREAD_START, Some(to_params(&thread)?))
            .await?;
        thread_id_from_result(&result)
            .ok_or_else(|| RuntimeError::protocol("thread/start response missing thread.id"))
    }

    async fn drive_turn(
        &self,
        generation: u64,
        thread_id: String,
        prompt: String,
        model: Option<&str>,
        effort: Option<ReasoningEffort>,
        completion: tokio::sync::oneshot::Receiver<TurnResult>,
    ) -> Result<TurnOutcome, RuntimeError> {
        let params = TurnStartParams::new(thread_id, prompt, model, effort);
        let result = self
            .send_request(generation, method::TURN_START, Some(to_params(&params)?))
            .await?;
        if let Some(turn_id) = turn_id_from_result(&result) {
            self.inner
                .with_generation(generation, |s| s.turn_mut().record_turn_id(&turn_id));
        }
        completion
            .await
            .unwrap_or_else(|_| Err(RuntimeError::process_not_running()))
    }

    // =========================================================================
    // Requests
    // =========================================================================

    async fn send_request(
        &self,
        generation: u64,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, RuntimeError> {
        let (id, reply, line, stdin) = self
            .inner
            .with_generation(generation, |session| {
                let (id, reply) = session.register_request(method)?;
                match JsonRpcRequest::new(id, method, params).to_line() {
                    Ok(line) => {
                        session.capture(Direction::Outgoing, &line);
                        Ok((id, reply, line, session.stdin()))
                    }
                    Err(e) => {
                        session.pending_mut().forget(id);
                        Err(RuntimeError::protocol(format!("encode {method}: {e}")))
                    }
                }
            })
            .ok_or_else(RuntimeError::process_not_running)??;

        if let Err(e) = stdin.write_line(&line).await {
            self.inner
                .with_generation(generation, |s| s.pending_mut().forget(id));
            return Err(RuntimeError::protocol(format!("write {method}: {e}")));
        }

        reply
            .await
            .unwrap_or_else(|_| Err(RuntimeError::process_not_running()))
    }

    async fn send_notification(
        &self,
        generation: u64,
        method: &str,
        params: Option<Value>,
    ) -> Result<(), RuntimeError> {
        let (line, stdin) = self
            .inner
            .with_generation(generation, |session| {
                if !session.is_alive() {
                    return Err(RuntimeError::process_not_running());
                }
                let line = JsonRpcNotification::new(method, params)
                    .to_line()
                    .map_err(|e| RuntimeError::protocol(format!("encode {method}: {e}")))?;
                session.capture(Direction::Outgoing, &line);
                Ok((line, session.stdin()))
            })
            .ok_or_else(RuntimeError::process_not_running)??;

        stdin
            .write_line(&line)
            .await
            .map_err(|e| RuntimeError::protocol(format!("write {method}: {e}")))
    }
}

impl Drop for AgentRuntime {
    fn drop(&mut self) {
        self.inner.teardown(&RuntimeError::disposed());
    }
}

impl std::fmt::Debug for AgentRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRuntime")
            .field("config", &self.config)
            .field("session", &self.inner.slot.lock().session)
            .finish()
    }
}

fn to_params<T: Serialize>(params: &T) -> Result<Value, RuntimeError> {
    serde_json::to_value(params).map_err(|e| RuntimeError::protocol(e.to_string()))
}

/// Tears the session down if a `run()` future is dropped mid-turn.
struct DropGuard {
    inner: Weak<Inner>,
    generation: u64,
    armed: bool,
}

impl DropGuard {
    fn new(inner: &Arc<Inner>, generation: u64) -> Self {
        Self {
            inner: Arc::downgrade(inner),
            generation,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(inner) = self.inner.upgrade() {
            tracing::debug!(generation = self.generation, "run dropped mid-turn");
            inner.teardown_generation(self.generation, &RuntimeError::cancelled_by_user());
        }
    }
}

/// Single consumer of the agent's stdout for one session generation.
fn spawn_reader(inner: Weak<Inner>, generation: u64, stdout: ChildStdout) -> JoinHandle<()> {
    tokio::spawn(async move {
        let eof = LineReader::new(stdout)
            .pump(|line| {
                let Some(inner) = inner.upgrade() else {
                    return ControlFlow::Break(());
                };
                let Some(routed) =
                    inner.with_generation(generation, |s| s.handle_incoming_line(&line))
                else {
                    return ControlFlow::Break(());
                };
                // Outside the lock: the callback may call back into the runtime.
                if let Some(delivery) = routed {
                    delivery.deliver();
                }
                ControlFlow::Continue(())
            })
            .await;

        if eof {
            if let Some(inner) = inner.upgrade() {
                inner.with_generation(generation, Session::mark_exited);
            }
        }
    })
}

#[cfg(test)]
#[path = "core_tests.rs"]
mod tests;
