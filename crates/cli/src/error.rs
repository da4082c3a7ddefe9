// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime error taxonomy.

use std::time::Duration;

use thiserror::Error;

use crate::wire::JsonRpcError;

/// Errors surfaced by the runtime client.
///
/// `Clone` so a single teardown cause can be delivered to every pending
/// request waiter and to the active turn.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// The agent subprocess could not be started.
    #[error("failed to launch agent: {0}")]
    LaunchFailed(String),

    /// Malformed or missing protocol data, a concurrent-turn violation,
    /// a JSON-RPC error response, or a dead process.
    #[error("{0}")]
    Protocol(String),

    /// The turn exceeded its deadline.
    #[error("timed out after {}s", .0.as_secs_f64())]
    TimedOut(Duration),

    /// The caller (or disposal) cancelled the work.
    #[error("{0}")]
    Cancelled(String),
}

impl RuntimeError {
    pub fn protocol(message: impl Into<String>) -> Self {
        RuntimeError::Protocol(message.into())
    }

    /// Teardown cause used by [`crate::runtime::AgentRuntime::cancel`].
    pub fn cancelled_by_user() -> Self {
        RuntimeError::Cancelled(CANCELLED_BY_USER.into())
    }

    /// Teardown cause used by [`crate::runtime::AgentRuntime::dispose`].
    pub fn disposed() -> Self {
        RuntimeError::Cancelled(RUNTIME_DISPOSED.into())
    }

    /// Teardown cause used when a stale session is replaced.
    pub fn session_restarted() -> Self {
        RuntimeError::Protocol(SESSION_RESTARTED.into())
    }

    pub fn process_not_running() -> Self {
        RuntimeError::Protocol(PROCESS_NOT_RUNNING.into())
    }

    pub fn process_exited() -> Self {
        RuntimeError::Protocol(PROCESS_EXITED.into())
    }

    pub fn turn_already_running() -> Self {
        RuntimeError::Protocol(TURN_ALREADY_RUNNING.into())
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, RuntimeError::TimedOut(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RuntimeError::Cancelled(_))
    }
}

impl From<JsonRpcError> for RuntimeError {
    fn from(err: JsonRpcError) -> Self {
        RuntimeError::Protocol(err.message)
    }
}

pub const CANCELLED_BY_USER: &str = "Cancelled by user.";
pub const RUNTIME_DISPOSED: &str = "Runtime disposed.";
pub const SESSION_RESTARTED: &str = "session restarted";
pub const PROCESS_NOT_RUNNING: &str = "agent process is not running";
pub const PROCESS_EXITED: &str = "agent process exited";
pub const TURN_ALREADY_RUNNING: &str = "a turn is already running";

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
