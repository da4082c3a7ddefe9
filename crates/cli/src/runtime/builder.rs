// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! RuntimeBuilder for constructing AgentRuntime with fluent API.

use std::path::Path;
use std::sync::Arc;

use quickedit_capture::CaptureLog;

use crate::config::{ConfigError, RuntimeConfig};
use crate::prompt::{DefaultComposer, PromptComposer};

use super::core::AgentRuntime;

/// Builder for constructing [`AgentRuntime`] instances.
///
/// ```ignore
/// let runtime = RuntimeBuilder::from_file(path)?
///     .with_capture(CaptureLog::new())
///     .build();
/// ```
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    composer: Arc<dyn PromptComposer>,
    capture: Option<CaptureLog>,
}

impl RuntimeBuilder {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            composer: Arc::new(DefaultComposer),
            capture: None,
        }
    }

    /// Start from a TOML file (or `QUICKEDIT_CONFIG`), with environment overrides applied.
    pub fn from_file(path: Option<&Path>) -> Result<Self, ConfigError> {
        RuntimeConfig::resolve(path).map(Self::new)
    }

    pub fn config_mut(&mut self) -> &mut RuntimeConfig {
        &mut self.config
    }

    pub fn with_composer(mut self, composer: impl PromptComposer + 'static) -> Self {
        self.composer = Arc::new(composer);
        self
    }

    /// Record every wire line to `capture`.
    pub fn with_capture(mut self, capture: CaptureLog) -> Self {
        self.capture = Some(capture);
        self
    }

    /// Record every wire line to a JSONL file.
    pub fn with_capture_file(self, path: &Path) -> std::io::Result<Self> {
        Ok(self.with_capture(CaptureLog::with_file(path)?))
    }

    pub fn build(self) -> AgentRuntime {
        AgentRuntime::from_parts(self.config, self.composer, self.capture)
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
