// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access.
//!
//! All runtime environment variables used by quickedit are defined here.
//! Use these accessors instead of calling `std::env::var()` directly.

/// Generated env var name constants.
mod names {
    include!(concat!(env!("OUT_DIR"), "/env_names.rs"));
}

// Re-export name constants for callers that need the raw name string.
pub use names::*;

use std::path::PathBuf;

/// `QUICKEDIT_CONFIG`: Path to the TOML runtime configuration.
pub fn config_path() -> Option<PathBuf> {
    std::env::var(names::QUICKEDIT_CONFIG)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

/// `QUICKEDIT_AGENT_COMMAND`: Agent launch command override.
pub fn agent_command() -> Option<String> {
    std::env::var(names::QUICKEDIT_AGENT_COMMAND)
        .ok()
        .filter(|v| !v.trim().is_empty())
}

/// `QUICKEDIT_TIMEOUT_MS`: Turn timeout override. Default 60000.
pub fn timeout_ms() -> Option<u64> {
    var_u64(names::QUICKEDIT_TIMEOUT_MS)
}

/// `QUICKEDIT_MODEL`: Model override passed to `thread/start` and `turn/start`.
pub fn model() -> Option<String> {
    std::env::var(names::QUICKEDIT_MODEL)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `SHELL`: User's login shell.
pub fn shell() -> Option<PathBuf> {
    std::env::var(names::SHELL)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

fn var_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
