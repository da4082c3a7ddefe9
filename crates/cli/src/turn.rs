// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Single-turn state machine.
//!
//! A turn moves `Idle → Starting → Running → Terminal → Idle`:
//! - **Starting**: `turn/start` sent, turn id not known yet
//! - **Running**: turn id known (from the `turn/start` response or the
//!   `turn/started` notification, whichever lands first)
//! - **Terminal**: the completion handle was settled and the state dropped
//!
//! At most one turn is tracked at a time. Notifications are filtered by a
//! permissive matching rule: a missing `threadId` or `turnId` on either side
//! counts as a match.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::oneshot;

use crate::error::RuntimeError;
use crate::protocol::{ServerNotification, ThreadItem};
use crate::usage::TokenUsage;

/// Callback receiving streamed output fragments.
pub type DeltaSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Settlement delivered to the `run()` caller.
pub type TurnResult = Result<TurnOutcome, RuntimeError>;

/// Status reported when `turn/completed` omits one.
pub const FALLBACK_STATUS: &str = "failed";

/// Status that maps to a zero exit code.
pub const COMPLETED_STATUS: &str = "completed";

/// Terminal snapshot of a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOutcome {
    pub output: String,
    pub token_usage: Option<TokenUsage>,
    pub status: String,
    pub error_message: Option<String>,
}

impl TurnOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == COMPLETED_STATUS
    }
}

/// Observable phase of the tracked turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Starting,
    Running,
}

/// A streamed fragment waiting to be handed to the caller's callback.
///
/// Delivered outside the session lock so a callback may call back into the
/// runtime (for example to cancel).
pub struct Delivery {
    sink: DeltaSink,
    text: String,
}

impl Delivery {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn deliver(self) {
        (self.sink)(&self.text);
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery").field("text", &self.text).finish()
    }
}

/// Effects of applying one notification.
#[derive(Debug, Default)]
pub struct TurnEffect {
    /// Fragment to stream to the caller, if any.
    pub delivery: Option<Delivery>,
    /// The turn was settled by this notification.
    pub completed: bool,
}

struct ActiveTurn {
    thread_id: String,
    turn_id: Option<String>,
    output: String,
    token_usage: Option<TokenUsage>,
    error_message: Option<String>,
    completion: oneshot::Sender<TurnResult>,
    on_delta: Option<DeltaSink>,
}

impl ActiveTurn {
    fn matches(&self, thread_id: Option<&str>, turn_id: Option<&str>) -> bool {
        self.matches_thread(thread_id)
            && match (turn_id, self.turn_id.as_deref()) {
                (Some(incoming), Some(current)) => incoming == current,
                _ => true,
            }
    }

    fn matches_thread(&self, thread_id: Option<&str>) -> bool {
        thread_id.is_none_or(|t| t == self.thread_id)
    }

    fn delivery(&self, text: &str) -> Option<Delivery> {
        self.on_delta.as_ref().map(|sink| Delivery {
            sink: Arc::clone(sink),
            text: text.to_string(),
        })
    }
}

/// Tracks the at-most-one live turn of a session.
#[derive(Default)]
pub struct TurnTracker {
    active: Option<ActiveTurn>,
}

impl TurnTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a turn on `thread_id`.
    ///
    /// Fails without touching the current turn if one is already live.
    pub fn begin(
        &mut self,
        thread_id: impl Into<String>,
        on_delta: Option<DeltaSink>,
    ) -> Result<oneshot::Receiver<TurnResult>, RuntimeError> {
        if self.active.is_some() {
            return Err(RuntimeError::turn_already_running());
        }
        let (completion, receiver) = oneshot::channel();
        self.active = Some(ActiveTurn {
            thread_id: thread_id.into(),
            turn_id: None,
            output: String::new(),
            token_usage: None,
            error_message: None,
            completion,
            on_delta,
        });
        Ok(receiver)
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn phase(&self) -> TurnPhase {
        match &self.active {
            None => TurnPhase::Idle,
            Some(turn) if turn.turn_id.is_none() => TurnPhase::Starting,
            Some(_) => TurnPhase::Running,
        }
    }

    pub fn turn_id(&self) -> Option<&str> {
        self.active.as_ref().and_then(|t| t.turn_id.as_deref())
    }

    pub fn output(&self) -> Option<&str> {
        self.active.as_ref().map(|t| t.output.as_str())
    }

    /// Record the turn id if it is not known yet. First writer wins.
    pub fn record_turn_id(&mut self, turn_id: &str) {
        if let Some(turn) = self.active.as_mut() {
            match &turn.turn_id {
                None => {
                    tracing::debug!(turn_id, "turn id recorded");
                    turn.turn_id = Some(turn_id.to_string());
                }
                Some(existing) if existing != turn_id => {
                    tracing::warn!(%existing, turn_id, "conflicting turn id ignored");
                }
                Some(_) => {}
            }
        }
    }

    /// Apply one notification to the live turn.
    pub fn apply(&mut self, notification: &ServerNotification) -> TurnEffect {
        let Some(turn) = self.active.as_mut() else {
            return TurnEffect::default();
        };

        match notification {
            ServerNotification::TurnStarted(n) => {
                if turn.matches(n.thread_id.as_deref(), n.turn_id.as_deref()) {
                    if let Some(id) = n.turn.id.as_deref() {
                        self.record_turn_id(id);
                    }
                }
                TurnEffect::default()
            }
            ServerNotification::AgentMessageDelta(n) => {
                if n.delta.is_empty() || !turn.matches(n.thread_id.as_deref(), n.turn_id.as_deref())
                {
                    return TurnEffect::default();
                }
                turn.output.push_str(&n.delta);
                TurnEffect {
                    delivery: turn.delivery(&n.delta),
                    completed: false,
                }
            }
            ServerNotification::ItemCompleted(n) => {
                let ThreadItem::AgentMessage { text } = &n.item else {
                    return TurnEffect::default();
                };
                if text.is_empty()
                    || !turn.output.is_empty()
                    || !turn.matches(n.thread_id.as_deref(), n.turn_id.as_deref())
                {
                    return TurnEffect::default();
                }
                turn.output = text.clone();
                TurnEffect {
                    delivery: turn.delivery(text),
                    completed: false,
                }
            }
            ServerNotification::TokenUsageUpdated(n) => {
                if turn.matches(n.thread_id.as_deref(), n.turn_id.as_deref()) {
                    if let Some(last) = n.token_usage.last {
                        turn.token_usage = Some(last.merged_over(turn.token_usage));
                    }
                }
                TurnEffect::default()
            }
            ServerNotification::TurnCompleted(n) => {
                if !turn.matches_thread(n.thread_id.as_deref()) {
                    return TurnEffect::default();
                }
                let error_message = n
                    .turn
                    .error
                    .as_ref()
                    .and_then(|e| e.message.clone())
                    .filter(|m| !m.trim().is_empty());
                let status = n
                    .turn
                    .status
                    .clone()
                    .unwrap_or_else(|| FALLBACK_STATUS.to_string());
                self.settle(status, error_message)
            }
            ServerNotification::Error(n) => {
                if let Some(message) = n.message() {
                    turn.error_message = Some(message.to_string());
                }
                TurnEffect::default()
            }
        }
    }

    fn settle(&mut self, status: String, error_message: Option<String>) -> TurnEffect {
        let Some(turn) = self.active.take() else {
            return TurnEffect::default();
        };
        let outcome = TurnOutcome {
            output: turn.output,
            token_usage: turn.token_usage,
            error_message: error_message.or(turn.error_message),
            status,
        };
        tracing::debug!(status = %outcome.status, turn_id = ?turn.turn_id, "turn settled");
        let _ = turn.completion.send(Ok(outcome));
        TurnEffect {
            delivery: None,
            completed: true,
        }
    }

    /// Reject the live turn with `error`. Returns false if no turn was live.
    pub fn fail(&mut self, error: &RuntimeError) -> bool {
        match self.active.take() {
            Some(turn) => {
                let _ = turn.completion.send(Err(error.clone()));
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for TurnTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TurnTracker")
            .field("phase", &self.phase())
            .field("turn_id", &self.turn_id())
            .finish()
    }
}

#[cfg(test)]
#[path = "turn_tests.rs"]
mod tests;
