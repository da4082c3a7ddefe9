// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Diagnostic logging for the binary.
//!
//! Library code only emits `tracing` events; the subscriber is installed
//! here, writing to stderr so stdout stays reserved for agent output.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::env;

/// Build the filter from `QUICKEDIT_LOG`, defaulting to `warn`.
///
/// Unparsable directives are skipped rather than rejected.
pub fn env_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .with_env_var(env::QUICKEDIT_LOG)
        .from_env_lossy()
}

/// Parse `directives` the same way, for an explicit filter string.
pub fn parse_filter(directives: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .parse_lossy(directives)
}

/// Install the stderr subscriber. A second call is a no-op.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
