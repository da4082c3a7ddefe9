// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! quickedit
//!
//! A runtime client for a long-lived coding agent that speaks JSON-RPC over
//! stdio (`codex app-server`). The client spawns the agent through the user's
//! login shell, performs the `initialize` / `initialized` / `thread/start`
//! handshake once, and then runs one turn at a time against the same thread,
//! streaming text deltas back to the caller.
//!
//! ```ignore
//! let runtime = RuntimeBuilder::from_file(None)?.build();
//! let result = runtime
//!     .run(RunRequest::new("make this formal", Some(selection)).on_delta(|d| print!("{d}")))
//!     .await?;
//! ```

pub mod ansi;
/// Re-exported capture types from the quickedit-capture crate.
pub mod capture {
    pub use quickedit_capture::{CaptureLog, CapturedFrame, Direction};
}
#[doc(hidden)]
pub mod cli;
pub mod config;
pub mod correlator;
#[doc(hidden)]
pub mod env;
pub mod error;
#[doc(hidden)]
pub mod logging;
#[doc(hidden)]
pub mod output;
pub mod prompt;
pub mod protocol;
pub mod runtime;
pub mod session;
pub mod stderr;
pub mod turn;
pub mod usage;
pub mod wire;

pub use error::RuntimeError;
pub use runtime::{AgentRuntime, RunRequest, RunResult, RuntimeBuilder};
