// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Wire-traffic capture and recording.
//!
//! This crate records every JSON-RPC line exchanged with the agent process,
//! useful for asserting handshake order in tests and for debugging a
//! misbehaving agent from a JSONL transcript.

mod duration_serde;
mod frame;
mod log;

pub use frame::{CapturedFrame, Direction};
pub use log::CaptureLog;
