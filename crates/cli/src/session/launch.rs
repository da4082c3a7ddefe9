// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Agent launch command construction.
//!
//! The agent runs through the user's shell (interactive login by default)
//! so PATH customizations from shell profiles and rc files apply. The shell script then appends
//! the configured extra directories to `PATH` and `exec`s the agent, so the
//! spawned pid is the agent itself and killing it needs no process group.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::config::AgentConfig;
use crate::env;

/// Fully resolved launch parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
}

impl LaunchCommand {
    pub fn from_config(agent: &AgentConfig) -> Self {
        let program = resolve_shell(agent.shell.as_deref());
        let mut args = Vec::with_capacity(4);
        if agent.login_shell {
            args.push("-l".to_string());
        }
        if agent.interactive_shell {
            args.push("-i".to_string());
        }
        args.push("-c".to_string());
        args.push(shell_script(&agent.command, &agent.extra_path));

        Self {
            program,
            args,
            env: agent.env.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            cwd: agent.cwd.clone(),
        }
    }

    /// Build the tokio command with stdin/stdout piped.
    ///
    /// Stderr is left for the caller to redirect.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.envs(&self.env);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }
}

/// Pick the shell: configured, then `$SHELL`, then the platform default.
pub fn resolve_shell(configured: Option<&Path>) -> PathBuf {
    configured
        .map(Path::to_path_buf)
        .or_else(env::shell)
        .unwrap_or_else(|| PathBuf::from(default_shell()))
}

pub fn default_shell() -> &'static str {
    if cfg!(target_os = "macos") {
        "/bin/zsh"
    } else {
        "/bin/bash"
    }
}

/// Script passed to `<shell> -c`.
pub fn shell_script(command: &str, extra_path: &[String]) -> String {
    let dirs: Vec<&str> = extra_path
        .iter()
        .map(|d| d.trim())
        .filter(|d| !d.is_empty())
        .collect();
    if dirs.is_empty() {
        return format!("exec {command}");
    }
    format!(
        "export PATH=\"${{PATH:+$PATH:}}\"{}; exec {command}",
        shell_quote(&dirs.join(":"))
    )
}

/// Single-quote `s` for POSIX shells.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
#[path = "launch_tests.rs"]
mod tests;
