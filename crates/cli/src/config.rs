// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime configuration loaded from TOML.
//!
//! ```toml
//! [agent]
//! command = "codex app-server"
//! login_shell = true
//! interactive_shell = true
//!
//! [turn]
//! timeout_ms = 60000
//! model = "gpt-5"
//! effort = "low"
//! ```
//!
//! Every section and field is optional. Precedence, lowest first: built-in
//! defaults, the config file, `QUICKEDIT_*` environment variables, CLI flags.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::env;
use crate::protocol::{ClientInfo, ReasoningEffort};

/// Command run inside the login shell when nothing else is configured.
pub const DEFAULT_AGENT_COMMAND: &str = "codex app-server";

/// Turn deadline when nothing else is configured.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Directories appended to `PATH` so common binaries resolve even when the
/// shell profile leaves them out.
pub const DEFAULT_EXTRA_PATH: &[&str] = &[
    "/opt/homebrew/bin",
    "/usr/local/bin",
    "/usr/bin",
    "/bin",
    "/usr/sbin",
    "/sbin",
];

fn default_true() -> bool {
    true
}

fn default_extra_path() -> Vec<String> {
    DEFAULT_EXTRA_PATH.iter().map(|s| s.to_string()).collect()
}

/// Top-level runtime configuration.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    pub agent: AgentConfig,
    pub client: ClientInfo,
    pub turn: TurnConfig,
}

/// How the agent subprocess is launched.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Shell command line that starts the agent.
    #[serde(default = "default_command")]
    pub command: String,

    /// Shell used to run `command`. Falls back to `$SHELL`, then a platform default.
    #[serde(default)]
    pub shell: Option<PathBuf>,

    /// Run as a login shell (`-l`) so profile PATH customizations apply.
    #[serde(default = "default_true")]
    pub login_shell: bool,

    /// Run as an interactive shell (`-i`) so rc files such as `.zshrc` are read.
    #[serde(default = "default_true")]
    pub interactive_shell: bool,

    /// Directories appended to `PATH` before the agent starts.
    #[serde(default = "default_extra_path")]
    pub extra_path: Vec<String>,

    /// Extra environment for the agent process.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Working directory for the agent process.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

fn default_command() -> String {
    DEFAULT_AGENT_COMMAND.to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            shell: None,
            login_shell: true,
            interactive_shell: true,
            extra_path: default_extra_path(),
            env: HashMap::new(),
            cwd: None,
        }
    }
}

/// Per-turn defaults.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TurnConfig {
    pub timeout_ms: u64,
    pub model: Option<String>,
    pub effort: Option<ReasoningEffort>,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            model: None,
            effort: None,
        }
    }
}

impl TurnConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl RuntimeConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.display().to_string(), e.to_string()))?;
        Self::parse(&content)
    }

    /// Parse from TOML content.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Resolve the effective configuration: `path` (or `QUICKEDIT_CONFIG`)
    /// if given, otherwise defaults, then environment overrides.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = env::config_path();
        let config = match path.or(from_env.as_deref()) {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        Ok(config.with_env_overrides())
    }

    /// Apply `QUICKEDIT_AGENT_COMMAND`, `QUICKEDIT_TIMEOUT_MS` and `QUICKEDIT_MODEL`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(command) = env::agent_command() {
            self.agent.command = command;
        }
        if let Some(timeout_ms) = env::timeout_ms() {
            self.turn.timeout_ms = timeout_ms;
        }
        if let Some(model) = env::model() {
            self.turn.model = Some(model);
        }
        self
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config from {0}: {1}")]
    Io(String, String),

    #[error("Failed to parse config: {0}")]
    Parse(String),
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
