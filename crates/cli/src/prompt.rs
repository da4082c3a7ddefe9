// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Prompt composition.
//!
//! The runtime never builds prompt text itself; it asks a [`PromptComposer`].
//! [`DefaultComposer`] covers the two built-in actions.

use serde::{Deserialize, Serialize};

/// What the user wants done with their command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Rewrite the selected text according to the command.
    Edit,
    /// Answer the command as a question, using the selection as context.
    Ask,
}

impl Action {
    /// `Edit` when text is selected, `Ask` otherwise.
    pub fn infer(selected_text: Option<&str>) -> Self {
        match selected_text {
            Some(text) if !text.trim().is_empty() => Action::Edit,
            _ => Action::Ask,
        }
    }
}

/// Inputs to prompt composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub command: String,
    pub selected_text: Option<String>,
    pub action: Action,
}

impl PromptRequest {
    pub fn new(command: impl Into<String>, selected_text: Option<String>, action: Action) -> Self {
        Self {
            command: command.into(),
            selected_text,
            action,
        }
    }

    /// The selection, if it contains anything but whitespace.
    pub fn selection(&self) -> Option<&str> {
        self.selected_text
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }
}

/// Turns a [`PromptRequest`] into the text sent as the turn input.
pub trait PromptComposer: Send + Sync {
    fn compose(&self, request: &PromptRequest) -> String;
}

impl<F> PromptComposer for F
where
    F: Fn(&PromptRequest) -> String + Send + Sync,
{
    fn compose(&self, request: &PromptRequest) -> String {
        self(request)
    }
}

/// Built-in composer for [`Action::Edit`] and [`Action::Ask`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultComposer;

const EDIT_PREAMBLE: &str = "Rewrite the selected text according to the instruction. \
Return only the rewritten text, with no explanation, quotes or code fences.";

const ASK_PREAMBLE: &str = "Answer the question concisely in plain text.";

impl PromptComposer for DefaultComposer {
    fn compose(&self, request: &PromptRequest) -> String {
        let command = request.command.trim();
        let mut prompt = String::new();
        match (request.action, request.selection()) {
            (Action::Edit, Some(selection)) => {
                prompt.push_str(EDIT_PREAMBLE);
                prompt.push_str("\n\nInstruction: ");
                prompt.push_str(command);
                push_selection(&mut prompt, selection);
            }
            (Action::Edit, None) => {
                prompt.push_str("Write text according to the instruction. ");
                prompt.push_str("Return only the text.\n\nInstruction: ");
                prompt.push_str(command);
            }
            (Action::Ask, selection) => {
                prompt.push_str(ASK_PREAMBLE);
                prompt.push_str("\n\nQuestion: ");
                prompt.push_str(command);
                if let Some(selection) = selection {
                    push_selection(&mut prompt, selection);
                }
            }
        }
        prompt
    }
}

/// Append the selection inside a fence longer than any backtick run it contains.
fn push_selection(prompt: &mut String, selection: &str) {
    let fence = "`".repeat(longest_backtick_run(selection).max(2) + 1);
    prompt.push_str("\n\nSelected text:\n");
    prompt.push_str(&fence);
    prompt.push('\n');
    prompt.push_str(selection);
    if !selection.ends_with('\n') {
        prompt.push('\n');
    }
    prompt.push_str(&fence);
}

fn longest_backtick_run(text: &str) -> usize {
    text.split(|c| c != '`').map(str::len).max().unwrap_or(0)
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
