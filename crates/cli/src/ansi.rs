// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! ANSI escape sequence stripping for agent output.

use regex::Regex;
use std::sync::LazyLock;

/// CSI sequences (`ESC [ ... final`), OSC sequences terminated by BEL or
/// `ESC \`, and two-byte `ESC x` escapes.
static ANSI_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    // SAFETY: This regex pattern is a compile-time constant and is guaranteed to be valid
    #[allow(clippy::expect_used)]
    Regex::new(r"\x1b(?:\[[0-?]*[ -/]*[@-~]|\][^\x07\x1b]*(?:\x07|\x1b\\)|[0-~])")
        .expect("ANSI regex pattern is invalid")
});

/// Remove all ANSI escape sequences from `input`.
pub fn strip_ansi(input: &str) -> String {
    if !input.contains('\x1b') {
        return input.to_string();
    }
    ANSI_REGEX.replace_all(input, "").into_owned()
}

/// Strip escapes and surrounding whitespace.
pub fn clean_output(input: &str) -> String {
    strip_ansi(input).trim().to_string()
}

#[cfg(test)]
#[path = "ansi_tests.rs"]
mod tests;
