// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Command-line arguments for the `quickedit` binary.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::prompt::Action;
use crate::protocol::ReasoningEffort;
use crate::runtime::RunRequest;

/// Exit code for a turn cancelled with Ctrl-C.
pub const EXIT_CANCELLED: i32 = 130;

/// Exit code for any other failure.
pub const EXIT_FAILURE: i32 = 1;

/// Run one edit or question through a long-lived coding agent
#[derive(Parser, Debug, Clone)]
#[command(name = "quickedit", version)]
pub struct Cli {
    /// What to do, e.g. "make this more formal" or "what does this function do?"
    #[arg(value_name = "COMMAND")]
    pub command: String,

    /// Text the command applies to
    #[arg(long, conflicts_with = "selected_text_file")]
    pub selected_text: Option<String>,

    /// Read the selected text from a file (`-` for stdin)
    #[arg(long, value_name = "PATH")]
    pub selected_text_file: Option<PathBuf>,

    /// Edit the selection or ask about it (default: edit when text is selected)
    #[arg(long, value_enum)]
    pub action: Option<Action>,

    /// Model override
    #[arg(long)]
    pub model: Option<String>,

    /// Reasoning effort for the turn
    #[arg(long, value_enum)]
    pub effort: Option<ReasoningEffort>,

    /// Turn timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// TOML configuration file
    #[arg(long, value_name = "PATH", env = "QUICKEDIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Record every JSON-RPC line to a JSONL file
    #[arg(long, value_name = "PATH")]
    pub capture: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "text")]
    pub output_format: OutputFormat,

    /// Print the output only once the turn finishes
    #[arg(long)]
    pub no_stream: bool,
}

impl Cli {
    /// Whether deltas should be printed as they arrive.
    pub fn streams(&self) -> bool {
        !self.no_stream && self.output_format == OutputFormat::Text
    }

    /// Load the selection from `--selected-text` or `--selected-text-file`.
    pub fn read_selected_text(&self) -> std::io::Result<Option<String>> {
        if let Some(text) = &self.selected_text {
            return Ok(Some(text.clone()));
        }
        match &self.selected_text_file {
            None => Ok(None),
            Some(path) if path == Path::new("-") => {
                let mut text = String::new();
                std::io::stdin().read_to_string(&mut text)?;
                Ok(Some(text))
            }
            Some(path) => std::fs::read_to_string(path).map(Some),
        }
    }

    /// Fold flag overrides into the loaded configuration.
    pub fn apply_overrides(&self, config: &mut RuntimeConfig) {
        if let Some(model) = &self.model {
            config.turn.model = Some(model.clone());
        }
        if let Some(effort) = self.effort {
            config.turn.effort = Some(effort);
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.turn.timeout_ms = timeout_ms;
        }
    }

    /// The request for this invocation. Streaming is attached by the caller.
    pub fn run_request(&self, selected_text: Option<String>) -> RunRequest {
        let mut request = RunRequest::new(self.command.clone(), selected_text);
        if let Some(action) = self.action {
            request = request.action(action);
        }
        if let Some(timeout_ms) = self.timeout_ms {
            request = request.timeout(Duration::from_millis(timeout_ms));
        }
        request
    }
}

/// Process exit code for a run that failed with `err`.
pub fn exit_code(err: &RuntimeError) -> i32 {
    if err.is_cancelled() {
        EXIT_CANCELLED
    } else {
        EXIT_FAILURE
    }
}

/// Output format for the final result
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text, streamed as it arrives
    #[default]
    Text,
    /// One JSON object once the turn finishes
    Json,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
