// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Agent stderr summarization.
//!
//! Agents log a lot of noise to stderr. When a turn fails the runtime
//! surfaces one line from the capture file, chosen in this order:
//! 1. the first embedded JSON `"detail"` string (API error bodies)
//! 2. the first line mentioning an error keyword
//! 3. the first line that is not boilerplate
//!
//! The result is clipped to [`MAX_SUMMARY_CHARS`].

use regex::Regex;
use std::sync::LazyLock;

use crate::ansi::strip_ansi;

/// Upper bound on a summary, in characters.
pub const MAX_SUMMARY_CHARS: usize = 280;

static DETAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    // SAFETY: This regex pattern is a compile-time constant and is guaranteed to be valid
    #[allow(clippy::expect_used)]
    Regex::new(r#""detail"\s*:\s*("(?:[^"\\]|\\.)*")"#).expect("detail regex pattern is invalid")
});

static KEYWORD_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    // SAFETY: This regex pattern is a compile-time constant and is guaranteed to be valid
    #[allow(clippy::expect_used)]
    Regex::new(
        r"(?i)\b(error|failed|failure|fatal|panic(?:ked)?|exception|denied|unauthorized|forbidden|not found|invalid|refused|timed? ?out)\b",
    )
    .expect("keyword regex pattern is invalid")
});

/// Summarize raw stderr. Returns `None` when nothing useful remains.
pub fn summarize(raw: &str) -> Option<String> {
    let text = strip_ansi(raw);
    if text.trim().is_empty() {
        return None;
    }

    if let Some(detail) = embedded_detail(&text) {
        return Some(clip(&detail));
    }

    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !is_boilerplate(l))
        .collect();

    lines
        .iter()
        .find(|l| KEYWORD_REGEX.is_match(l))
        .or_else(|| lines.first())
        .map(|l| clip(l))
}

/// First `"detail": "..."` string value, unescaped.
fn embedded_detail(text: &str) -> Option<String> {
    DETAIL_REGEX.captures_iter(text).find_map(|caps| {
        let quoted = caps.get(1)?.as_str();
        serde_json::from_str::<String>(quoted)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Lines that never explain a failure on their own.
fn is_boilerplate(line: &str) -> bool {
    if line.is_empty() || line.chars().all(|c| "{}[](),;:-=*#_.".contains(c)) {
        return true;
    }
    let lower = line.to_ascii_lowercase();
    lower.starts_with("at ")
        || lower.starts_with("file \"")
        || lower.starts_with("note:")
        || lower.starts_with("hint:")
        || lower.starts_with("stack backtrace")
        || lower.starts_with("traceback (most recent call last)")
        || lower.starts_with("run with `rust_backtrace")
}

/// Clip to [`MAX_SUMMARY_CHARS`] characters, marking the cut with `…`.
pub fn clip(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(MAX_SUMMARY_CHARS) {
        None => text.to_string(),
        Some((cut, _)) => {
            let mut clipped = text[..cut].trim_end().to_string();
            clipped.push('…');
            clipped
        }
    }
}

#[cfg(test)]
#[path = "stderr_tests.rs"]
mod tests;
