// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime client facade.
//!
//! This module provides:
//! - [`AgentRuntime`] - prewarm, run, cancel and dispose against one agent process
//! - [`RuntimeBuilder`] - Fluent API for constructing AgentRuntime instances
//! - [`RunRequest`] / [`RunResult`] - per-turn inputs and outputs

mod builder;
mod core;
mod request;

pub use builder::RuntimeBuilder;
pub use core::AgentRuntime;
pub use request::{RunRequest, RunResult};
