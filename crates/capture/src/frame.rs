// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Captured frame data types.

use super::duration_serde;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// Captured wire frame
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CapturedFrame {
    /// Sequence number
    pub seq: u64,

    /// Wall-clock timestamp
    pub timestamp: SystemTime,

    /// Elapsed time since capture started
    #[serde(with = "duration_serde")]
    pub elapsed: Duration,

    /// Agent session the frame belongs to (increments on every respawn)
    pub session: u64,

    /// Which way the frame travelled
    pub direction: Direction,

    /// Raw line, without the trailing newline
    pub line: String,
}

impl CapturedFrame {
    /// Parse the line as JSON, if it is JSON.
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.line).ok()
    }

    /// The JSON-RPC `method` carried by this frame, if any.
    pub fn method(&self) -> Option<String> {
        self.json()?
            .get("method")
            .and_then(|m| m.as_str())
            .map(str::to_string)
    }
}

/// Direction of a captured frame
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Written by the client to the agent's stdin
    Outgoing,
    /// Read by the client from the agent's stdout
    Incoming,
    /// Stderr snapshot taken while handling a failure
    Stderr,
}

#[cfg(test)]
#[path = "frame_tests.rs"]
mod tests;
