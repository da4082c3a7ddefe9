// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Caller-facing request and result types for a single turn.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::ansi::clean_output;
use crate::prompt::{Action, PromptRequest};
use crate::protocol::ReasoningEffort;
use crate::turn::{DeltaSink, TurnOutcome};
use crate::usage::TokenUsage;

/// One `run()` invocation.
#[derive(Clone)]
pub struct RunRequest {
    pub prompt: PromptRequest,
    /// Overrides the configured model.
    pub model: Option<String>,
    /// Overrides the configured reasoning effort.
    pub effort: Option<ReasoningEffort>,
    /// Overrides the configured turn timeout.
    pub timeout: Option<Duration>,
    pub on_delta: Option<DeltaSink>,
}

impl RunRequest {
    /// A request whose action is inferred from the selection.
    pub fn new(command: impl Into<String>, selected_text: Option<String>) -> Self {
        let action = Action::infer(selected_text.as_deref());
        Self {
            prompt: PromptRequest::new(command, selected_text, action),
            model: None,
            effort: None,
            timeout: None,
            on_delta: None,
        }
    }

    pub fn action(mut self, action: Action) -> Self {
        self.prompt.action = action;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn effort(mut self, effort: ReasoningEffort) -> Self {
        self.effort = Some(effort);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Stream output fragments to `f` as they arrive.
    pub fn on_delta<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on_delta = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for RunRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunRequest")
            .field("prompt", &self.prompt)
            .field("model", &self.model)
            .field("effort", &self.effort)
            .field("timeout", &self.timeout)
            .field("streaming", &self.on_delta.is_some())
            .finish()
    }
}

/// Final result of a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    /// ANSI-stripped, trimmed output.
    pub stdout: String,
    /// Failure detail when `exit_code` is 1.
    pub stderr: String,
    pub exit_code: i32,
    pub token_usage: Option<TokenUsage>,
}

impl RunResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

impl From<TurnOutcome> for RunResult {
    fn from(outcome: TurnOutcome) -> Self {
        let stdout = clean_output(&outcome.output);
        if outcome.is_completed() {
            return Self {
                stdout,
                stderr: String::new(),
                exit_code: 0,
                token_usage: outcome.token_usage,
            };
        }
        let stderr = outcome
            .error_message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("turn {}.", outcome.status));
        Self {
            stdout,
            stderr,
            exit_code: 1,
            token_usage: outcome.token_usage,
        }
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
