// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Newline-delimited JSON-RPC 2.0 codec.
//!
//! Every outgoing message is one UTF-8 JSON object followed by `\n`. Incoming
//! stdout is decoded one line at a time: whitespace is trimmed, empty lines are
//! dropped, and anything that is not a JSON object is discarded so that stray
//! log noise on the agent's stdout never breaks the stream.
//!
//! # Example
//!
//! ```
//! use quickedit::wire::{decode_line, JsonRpcRequest};
//!
//! let line = JsonRpcRequest::new(100, "initialize", None).to_line().unwrap();
//! assert_eq!(line, "{\"jsonrpc\":\"2.0\",\"id\":100,\"method\":\"initialize\"}\n");
//!
//! let incoming = decode_line(r#"  {"id":100,"result":{"ok":true}}  "#).unwrap();
//! assert_eq!(incoming.id(), Some(100));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON-RPC protocol version carried by every outgoing message.
pub const JSONRPC_VERSION: &str = "2.0";

/// Request identifier. Allocated monotonically per session.
pub type RequestId = i64;

// ============================================================================
// Outgoing Messages
// ============================================================================

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: &'static str,
    /// Request identifier.
    pub id: RequestId,
    /// Method name to invoke.
    pub method: String,
    /// Optional parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Create a new JSON-RPC request.
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: method.into(),
            params,
        }
    }

    /// Serialize to a single newline-terminated line.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        encode(self)
    }
}

/// JSON-RPC 2.0 notification (no id, no response expected).
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    /// JSON-RPC version (always "2.0").
    pub jsonrpc: &'static str,
    /// Method name.
    pub method: String,
    /// Optional parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Create a new JSON-RPC notification.
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: method.into(),
            params,
        }
    }

    /// Serialize to a single newline-terminated line.
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        encode(self)
    }
}

/// Serialize any message as one JSON line terminated by `\n`.
pub fn encode<T: Serialize>(message: &T) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

// ============================================================================
// Incoming Messages
// ============================================================================

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct JsonRpcError {
    /// Error code, when the server sends one.
    #[serde(default)]
    pub code: Option<i64>,
    /// Human-readable error message.
    #[serde(default = "default_error_message")]
    pub message: String,
    /// Additional error data.
    #[serde(default)]
    pub data: Option<Value>,
}

fn default_error_message() -> String {
    "request failed".to_string()
}

/// A decoded line from the agent's stdout.
///
/// Kept as a raw JSON object: whether it is a response or a notification
/// depends on which request ids are pending when it is dispatched.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingMessage {
    object: Map<String, Value>,
}

impl IncomingMessage {
    /// Wrap an already-parsed JSON object.
    pub fn from_object(object: Map<String, Value>) -> Self {
        Self { object }
    }

    /// Integer `id`, if present. String ids never match a pending request.
    pub fn id(&self) -> Option<RequestId> {
        self.object.get("id").and_then(Value::as_i64)
    }

    /// String `method`, if present.
    pub fn method(&self) -> Option<&str> {
        self.object.get("method").and_then(Value::as_str)
    }

    /// Object `params`, if present.
    pub fn params(&self) -> Option<&Map<String, Value>> {
        self.object.get("params").and_then(Value::as_object)
    }

    /// Notification shape: a string `method` and object `params`.
    pub fn as_notification(&self) -> Option<(&str, &Map<String, Value>)> {
        Some((self.method()?, self.params()?))
    }

    /// Interpret as a response: `error` wins over `result`; a missing
    /// `result` resolves to `null`.
    pub fn into_response(mut self) -> Result<Value, JsonRpcError> {
        if let Some(error) = self.object.remove("error") {
            if !error.is_null() {
                return Err(parse_error(error));
            }
        }
        Ok(self.object.remove("result").unwrap_or(Value::Null))
    }

    /// Access the underlying object.
    pub fn as_object(&self) -> &Map<String, Value> {
        &self.object
    }
}

fn parse_error(error: Value) -> JsonRpcError {
    match error {
        Value::String(message) => JsonRpcError {
            code: None,
            message,
            data: None,
        },
        other => serde_json::from_value(other).unwrap_or_else(|_| JsonRpcError {
            code: None,
            message: default_error_message(),
            data: None,
        }),
    }
}

/// Decode one stdout line.
///
/// Returns `None` for blank lines and for anything that does not parse as a
/// JSON object.
pub fn decode_line(line: &str) -> Option<IncomingMessage> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(object)) => Some(IncomingMessage::from_object(object)),
        _ => None,
    }
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
