// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Result rendering for text and JSON modes, plus error and warning lines
//! on stderr (colored when stderr is a terminal).

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::cli::{exit_code, OutputFormat};
use crate::error::RuntimeError;
use crate::runtime::RunResult;

// =============================================================================
// Diagnostics
// =============================================================================

/// Print an error message to stderr.
///
/// Displays in red when stderr is a terminal, plain text otherwise.
pub fn print_error(msg: impl std::fmt::Display) {
    let is_tty = io::stderr().is_terminal();
    write_error(&mut io::stderr(), msg, is_tty);
}

fn write_error<W: Write>(writer: &mut W, msg: impl std::fmt::Display, is_terminal: bool) {
    if is_terminal {
        let _ = writeln!(writer, "\x1b[31mError: {}\x1b[0m", msg);
    } else {
        let _ = writeln!(writer, "Error: {}", msg);
    }
}

/// Print a warning message to stderr.
pub fn print_warning(msg: impl std::fmt::Display) {
    let is_tty = io::stderr().is_terminal();
    write_warning(&mut io::stderr(), msg, is_tty);
}

fn write_warning<W: Write>(writer: &mut W, msg: impl std::fmt::Display, is_terminal: bool) {
    if is_terminal {
        let _ = writeln!(writer, "\x1b[33mWarning: {}\x1b[0m", msg);
    } else {
        let _ = writeln!(writer, "Warning: {}", msg);
    }
}

// =============================================================================
// Results
// =============================================================================

/// JSON body written for a run that ended in a [`RuntimeError`].
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorOutput {
    pub error: String,
    pub kind: &'static str,
    pub exit_code: i32,
}

impl ErrorOutput {
    pub fn new(err: &RuntimeError) -> Self {
        let kind = match err {
            RuntimeError::LaunchFailed(_) => "launch_failed",
            RuntimeError::Protocol(_) => "protocol",
            RuntimeError::TimedOut(_) => "timed_out",
            RuntimeError::Cancelled(_) => "cancelled",
        };
        Self {
            error: err.to_string(),
            kind,
            exit_code: exit_code(err),
        }
    }
}

/// Streams deltas to a writer and remembers whether the last byte was a newline.
///
/// Cloned into the run's delta callback, so it is `Send + Sync`.
pub struct DeltaPrinter<W: Write + Send> {
    state: Arc<Mutex<PrinterState<W>>>,
}

struct PrinterState<W> {
    writer: W,
    wrote_any: bool,
    at_line_start: bool,
}

impl<W: Write + Send> Clone for DeltaPrinter<W> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl DeltaPrinter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> DeltaPrinter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            state: Arc::new(Mutex::new(PrinterState {
                writer,
                wrote_any: false,
                at_line_start: true,
            })),
        }
    }

    /// Write one fragment and flush. Write errors are dropped; the final
    /// result still carries the full text.
    pub fn write(&self, delta: &str) {
        if delta.is_empty() {
            return;
        }
        let mut state = self.state.lock();
        let _ = state.writer.write_all(delta.as_bytes());
        let _ = state.writer.flush();
        state.wrote_any = true;
        state.at_line_start = delta.ends_with('\n');
    }

    pub fn wrote_any(&self) -> bool {
        self.state.lock().wrote_any
    }

    /// End a streamed line so the shell prompt starts on its own line.
    pub fn finish_line(&self) -> std::io::Result<()> {
        let mut state = self.state.lock();
        if state.wrote_any && !state.at_line_start {
            state.writer.write_all(b"\n")?;
            state.at_line_start = true;
        }
        state.writer.flush()
    }

    /// Run `f` against the underlying writer.
    pub fn with_writer<T>(&self, f: impl FnOnce(&mut W) -> T) -> T {
        f(&mut self.state.lock().writer)
    }
}

/// Writes the final result of a run in the configured format.
pub struct OutputWriter<W: Write> {
    writer: W,
    format: OutputFormat,
}

impl<W: Write> OutputWriter<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        Self { writer, format }
    }

    /// Write a finished turn. `streamed` means the text was already printed.
    ///
    /// In text mode the failure detail goes to stderr; in JSON mode it is
    /// part of the object.
    pub fn write_result(&mut self, result: &RunResult, streamed: bool) -> std::io::Result<()> {
        match self.format {
            OutputFormat::Text => {
                if !streamed && !result.stdout.is_empty() {
                    writeln!(self.writer, "{}", result.stdout)?;
                }
                if !result.success() {
                    print_error(&result.stderr);
                }
                self.writer.flush()
            }
            OutputFormat::Json => self.write_json_line(result),
        }
    }

    /// Write a run that never produced a result.
    pub fn write_error(&mut self, err: &RuntimeError) -> std::io::Result<()> {
        match self.format {
            OutputFormat::Text => {
                print_error(err);
                Ok(())
            }
            OutputFormat::Json => self.write_json_line(&ErrorOutput::new(err)),
        }
    }

    fn write_json_line<T: Serialize>(&mut self, value: &T) -> std::io::Result<()> {
        let json = serde_json::to_string(value)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writeln!(self.writer, "{}", json)?;
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
#[path = "output_tests.rs"]
mod tests;
