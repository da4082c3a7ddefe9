// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Process session: one agent subprocess and all state tied to it.
//!
//! A [`Session`] owns the child, its stdin writer, the stdout reader task,
//! the stderr capture file, the thread id, the pending request table and
//! the turn tracker. It is recreated wholesale on respawn and consumed by
//! [`Session::teardown`].

pub mod launch;
pub mod process;

use quickedit_capture::{CaptureLog, Direction};
use tokio::process::Child;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::correlator::{PendingRequests, Reply, Route};
use crate::error::RuntimeError;
use crate::protocol::ServerNotification;
use crate::turn::{Delivery, TurnTracker};
use crate::wire::{decode_line, RequestId};

pub use launch::LaunchCommand;
pub use process::{spawn, LineReader, SpawnedAgent, StderrCapture, StdinWriter};

/// Live state of one agent subprocess.
pub struct Session {
    generation: u64,
    child: Child,
    stdin: StdinWriter,
    reader: Option<JoinHandle<()>>,
    stderr: StderrCapture,
    thread_id: Option<String>,
    pending: PendingRequests,
    turn: TurnTracker,
    alive: bool,
    capture: Option<CaptureLog>,
}

impl Session {
    /// Wrap a spawned agent. The caller owns `stdout` and must attach the
    /// reader task with [`Session::attach_reader`].
    pub fn new(
        generation: u64,
        child: Child,
        stdin: StdinWriter,
        stderr: StderrCapture,
        capture: Option<CaptureLog>,
    ) -> Self {
        Self {
            generation,
            child,
            stdin,
            reader: None,
            stderr,
            thread_id: None,
            pending: PendingRequests::new(),
            turn: TurnTracker::new(),
            alive: true,
            capture,
        }
    }

    pub fn attach_reader(&mut self, handle: JoinHandle<()>) {
        self.reader = Some(handle);
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    pub fn set_thread_id(&mut self, thread_id: String) {
        self.thread_id = Some(thread_id);
    }

    /// The process is running and its stdout is still open.
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Alive and handshaken: reusable for a turn.
    pub fn is_ready(&self) -> bool {
        self.alive && self.thread_id.is_some()
    }

    pub fn stdin(&self) -> StdinWriter {
        self.stdin.clone()
    }

    pub fn pending(&self) -> &PendingRequests {
        &self.pending
    }

    pub fn pending_mut(&mut self) -> &mut PendingRequests {
        &mut self.pending
    }

    pub fn turn(&self) -> &TurnTracker {
        &self.turn
    }

    pub fn turn_mut(&mut self) -> &mut TurnTracker {
        &mut self.turn
    }

    pub fn stderr_snapshot(&self) -> String {
        self.stderr.snapshot()
    }

    pub fn stderr_path(&self) -> &std::path::Path {
        self.stderr.path()
    }

    /// Register a waiter for `method`. Fails if the process is gone.
    pub fn register_request(
        &mut self,
        method: &str,
    ) -> Result<(RequestId, oneshot::Receiver<Reply>), RuntimeError> {
        if !self.alive {
            return Err(RuntimeError::process_not_running());
        }
        let (id, receiver) = self.pending.register(method);
        tracing::debug!(id, method, "request registered");
        Ok((id, receiver))
    }

    /// Record a frame on the capture log, if one is attached.
    pub fn capture(&self, direction: Direction, line: &str) {
        if let Some(capture) = &self.capture {
            capture.record(self.generation, direction, line.trim_end_matches('\n'));
        }
    }

    /// Dispatch one stdout line: responses to pending ids first, then
    /// notifications to the turn tracker.
    ///
    /// Returns a streamed fragment to deliver once the caller has released
    /// its lock.
    pub fn handle_incoming_line(&mut self, line: &str) -> Option<Delivery> {
        tracing::trace!(line, "agent line");
        self.capture(Direction::Incoming, line);

        let message = decode_line(line)?;
        let message = match self.pending.route(message) {
            Route::Resolved { id, method } => {
                tracing::debug!(id, %method, "response routed");
                return None;
            }
            Route::Ignored => return None,
            Route::Notification(message) => message,
        };

        let (method, params) = message.as_notification()?;
        match ServerNotification::decode(method, params) {
            Ok(Some(notification)) => {
                let effect = self.turn.apply(&notification);
                if effect.completed {
                    tracing::debug!(
                        generation = self.generation,
                        method = notification.method(),
                        "turn settled"
                    );
                }
                effect.delivery
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring notification");
                None
            }
        }
    }

    /// Stdout closed: fail everything in flight and mark the session dead.
    ///
    /// The child handle and stderr file stay so the failing caller can
    /// snapshot diagnostics before the next teardown.
    pub fn mark_exited(&mut self) {
        if !self.alive {
            return;
        }
        tracing::warn!(generation = self.generation, "agent closed stdout");
        self.alive = false;
        let cause = RuntimeError::process_exited();
        self.pending.fail_all(&cause);
        self.turn.fail(&cause);
    }

    /// Fail every waiter and the active turn with `cause`, kill the process
    /// and delete the stderr file.
    pub fn teardown(mut self, cause: &RuntimeError) {
        let drained = self.pending.fail_all(cause);
        let had_turn = self.turn.fail(cause);
        tracing::debug!(
            generation = self.generation,
            %cause,
            drained,
            had_turn,
            "session torn down"
        );
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(error = %e, "agent already exited");
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.alive = false;
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("generation", &self.generation)
            .field("pid", &self.child.id())
            .field("thread_id", &self.thread_id)
            .field("pending", &self.pending.len())
            .field("turn", &self.turn)
            .field("alive", &self.alive)
            .field("stderr", &self.stderr.path())
            .finish()
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
