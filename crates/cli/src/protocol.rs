// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Agent protocol message types.
//!
//! Typed parameters for the fixed handshake (`initialize` → `initialized` →
//! `thread/start`) and for `turn/start`, plus a closed union of the server
//! notifications the turn state machine consumes.
//!
//! # Wire Format
//!
//! All params are camelCase JSON objects carried inside JSON-RPC 2.0
//! envelopes (see [`crate::wire`]). Notifications are decoded per method:
//! an unknown method is not an error, but a known method whose payload does
//! not match its schema is reported as [`NotificationDecodeError`] so drift
//! in the agent's payloads is visible instead of silently ignored. The turn
//! descriptor inside `turn/started` and `turn/completed` is the exception:
//! it decodes leniently so a completion is never lost to a bad field.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::usage::TokenUsage;

/// Method names used by the client.
pub mod method {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "initialized";
    pub const THREAD_START: &str = "thread/start";
    pub const TURN_START: &str = "turn/start";

    pub const TURN_STARTED: &str = "turn/started";
    pub const AGENT_MESSAGE_DELTA: &str = "item/agentMessage/delta";
    pub const ITEM_COMPLETED: &str = "item/completed";
    pub const TOKEN_USAGE_UPDATED: &str = "thread/tokenUsage/updated";
    pub const TURN_COMPLETED: &str = "turn/completed";
    pub const ERROR: &str = "error";
}

// =============================================================================
// Handshake
// =============================================================================

/// Client information sent during initialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: "quickedit".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

/// Client capabilities sent during initialization.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCapabilities {
    /// Opt in to unstable protocol surface. Always off.
    pub experimental_api: bool,
}

/// `initialize` request parameters.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub client_info: ClientInfo,
    pub capabilities: ClientCapabilities,
}

/// When the agent asks before running commands. This client never wants prompts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApprovalPolicy {
    #[default]
    Never,
}

/// Thread-level sandbox mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SandboxMode {
    #[default]
    DangerFullAccess,
}

/// `thread/start` request parameters.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadStartParams {
    pub approval_policy: ApprovalPolicy,
    pub sandbox: SandboxMode,
    pub experimental_raw_events: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ThreadStartParams {
    /// Build params, trimming the model and dropping it when blank.
    pub fn new(model: Option<&str>) -> Self {
        Self {
            model: normalize_model(model),
            ..Default::default()
        }
    }
}

/// Trim a model name, treating blank as absent.
pub fn normalize_model(model: Option<&str>) -> Option<String> {
    model
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

/// Extract `thread.id` from a `thread/start` result.
pub fn thread_id_from_result(result: &Value) -> Option<String> {
    result
        .pointer("/thread/id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Turns
// =============================================================================

/// Reasoning effort requested for a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Minimal,
    Low,
    Medium,
    High,
}

/// Turn-level sandbox policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SandboxPolicy {
    #[default]
    DangerFullAccess,
}

/// Reasoning summary verbosity. Summaries are never streamed to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningSummary {
    #[default]
    None,
}

/// One input item of a turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum UserInput {
    Text {
        text: String,
        text_elements: Vec<Value>,
    },
}

impl UserInput {
    pub fn text(text: impl Into<String>) -> Self {
        UserInput::Text {
            text: text.into(),
            text_elements: Vec::new(),
        }
    }
}

/// `turn/start` request parameters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnStartParams {
    pub thread_id: String,
    pub input: Vec<UserInput>,
    pub approval_policy: ApprovalPolicy,
    pub sandbox_policy: SandboxPolicy,
    pub summary: ReasoningSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effort: Option<ReasoningEffort>,
}

impl TurnStartParams {
    pub fn new(
        thread_id: impl Into<String>,
        prompt: impl Into<String>,
        model: Option<&str>,
        effort: Option<ReasoningEffort>,
    ) -> Self {
        Self {
            thread_id: thread_id.into(),
            input: vec![UserInput::text(prompt)],
            approval_policy: ApprovalPolicy::Never,
            sandbox_policy: SandboxPolicy::DangerFullAccess,
            summary: ReasoningSummary::None,
            model: normalize_model(model),
            effort,
        }
    }
}

/// Extract `turn.id` from a `turn/start` result.
pub fn turn_id_from_result(result: &Value) -> Option<String> {
    result
        .pointer("/turn/id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Server Notifications
// =============================================================================

/// Turn descriptor carried by `turn/started` and `turn/completed`.
///
/// Every field decodes leniently: a value of the wrong type reads as absent,
/// so a drifted `turn/completed` still settles the turn (as `"failed"`).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnInfo {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub error: Option<TurnError>,
}

/// Error detail attached to a finished turn.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TurnError {
    #[serde(default, deserialize_with = "lenient")]
    pub message: Option<String>,
}

/// Decode `T`, or fall back to its default when the value has the wrong shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::de::DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// `turn/started`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnStartedNotification {
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub turn_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub turn: TurnInfo,
}

/// `item/agentMessage/delta`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMessageDeltaNotification {
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub turn_id: Option<String>,
    #[serde(default)]
    pub delta: String,
}

/// Items reported by `item/completed`. Only agent messages matter here.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ThreadItem {
    AgentMessage {
        #[serde(default)]
        text: String,
    },
    #[serde(other)]
    Other,
}

/// `item/completed`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemCompletedNotification {
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub turn_id: Option<String>,
    pub item: ThreadItem,
}

/// Usage breakdown inside `thread/tokenUsage/updated`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TokenUsageBreakdown {
    #[serde(default)]
    pub last: Option<TokenUsage>,
}

/// `thread/tokenUsage/updated`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsageUpdatedNotification {
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub turn_id: Option<String>,
    #[serde(default)]
    pub token_usage: TokenUsageBreakdown,
}

/// `turn/completed`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnCompletedNotification {
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub turn: TurnInfo,
}

/// Bare protocol-level `error`.
///
/// Older agents send `{message}`, newer ones `{error: {message}}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorNotification {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<TurnError>,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub turn_id: Option<String>,
}

impl ErrorNotification {
    /// The best available message.
    pub fn message(&self) -> Option<&str> {
        self.message
            .as_deref()
            .or_else(|| self.error.as_ref().and_then(|e| e.message.as_deref()))
            .filter(|m| !m.trim().is_empty())
    }
}

/// Closed union of the notifications the client consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerNotification {
    TurnStarted(TurnStartedNotification),
    AgentMessageDelta(AgentMessageDeltaNotification),
    ItemCompleted(ItemCompletedNotification),
    TokenUsageUpdated(TokenUsageUpdatedNotification),
    TurnCompleted(TurnCompletedNotification),
    Error(ErrorNotification),
}

/// A known notification whose params failed schema validation.
#[derive(Debug, thiserror::Error)]
#[error("malformed {method} notification: {source}")]
pub struct NotificationDecodeError {
    pub method: String,
    #[source]
    pub source: serde_json::Error,
}

impl ServerNotification {
    /// Decode by method. Unknown methods yield `Ok(None)`.
    pub fn decode(
        method: &str,
        params: &Map<String, Value>,
    ) -> Result<Option<Self>, NotificationDecodeError> {
        fn typed<T: serde::de::DeserializeOwned>(
            method: &str,
            params: &Map<String, Value>,
        ) -> Result<T, NotificationDecodeError> {
            serde_json::from_value(Value::Object(params.clone())).map_err(|source| {
                NotificationDecodeError {
                    method: method.to_string(),
                    source,
                }
            })
        }

        let notification = match method {
            method::TURN_STARTED => Self::TurnStarted(typed(method, params)?),
            method::AGENT_MESSAGE_DELTA => Self::AgentMessageDelta(typed(method, params)?),
            method::ITEM_COMPLETED => Self::ItemCompleted(typed(method, params)?),
            method::TOKEN_USAGE_UPDATED => Self::TokenUsageUpdated(typed(method, params)?),
            method::TURN_COMPLETED => Self::TurnCompleted(typed(method, params)?),
            method::ERROR => Self::Error(typed(method, params)?),
            _ => return Ok(None),
        };
        Ok(Some(notification))
    }

    /// Method name this notification was decoded from.
    pub fn method(&self) -> &'static str {
        match self {
            Self::TurnStarted(_) => method::TURN_STARTED,
            Self::AgentMessageDelta(_) => method::AGENT_MESSAGE_DELTA,
            Self::ItemCompleted(_) => method::ITEM_COMPLETED,
            Self::TokenUsageUpdated(_) => method::TOKEN_USAGE_UPDATED,
            Self::TurnCompleted(_) => method::TURN_COMPLETED,
            Self::Error(_) => method::ERROR,
        }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
