// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Agent subprocess plumbing: spawn, stdin writer, stdout line reader and
//! stderr capture.

use std::fs::File;
use std::io;
use std::ops::ControlFlow;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use tempfile::NamedTempFile;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::Mutex;

use super::launch::LaunchCommand;
use crate::error::RuntimeError;

/// A freshly spawned agent with its stdio split out.
pub struct SpawnedAgent {
    pub child: Child,
    pub stdin: StdinWriter,
    pub stdout: ChildStdout,
    pub stderr: StderrCapture,
}

/// Spawn the agent with stdin/stdout piped and stderr sent to a temp file.
pub fn spawn(launch: &LaunchCommand) -> Result<SpawnedAgent, RuntimeError> {
    let stderr = StderrCapture::create()
        .map_err(|e| RuntimeError::LaunchFailed(format!("stderr capture: {e}")))?;
    let stderr_sink = stderr
        .writer()
        .map_err(|e| RuntimeError::LaunchFailed(format!("stderr capture: {e}")))?;

    let mut cmd = launch.to_command();
    cmd.stderr(Stdio::from(stderr_sink));

    let mut child = cmd.spawn().map_err(|e| {
        RuntimeError::LaunchFailed(format!("{}: {e}", launch.program.display()))
    })?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| RuntimeError::LaunchFailed("stdin not available".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| RuntimeError::LaunchFailed("stdout not available".into()))?;

    tracing::debug!(
        pid = child.id(),
        program = %launch.program.display(),
        stderr = %stderr.path().display(),
        "agent spawned"
    );

    Ok(SpawnedAgent {
        child,
        stdin: StdinWriter::new(stdin),
        stdout,
        stderr,
    })
}

/// Shared handle to the agent's stdin.
///
/// Each call writes one whole line under the lock, so concurrent writers
/// never interleave.
#[derive(Clone)]
pub struct StdinWriter {
    inner: Arc<Mutex<BufWriter<ChildStdin>>>,
}

impl StdinWriter {
    pub fn new(stdin: ChildStdin) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BufWriter::new(stdin))),
        }
    }

    /// Write `line` (which must already end in `\n`) and flush.
    pub async fn write_line(&self, line: &str) -> io::Result<()> {
        let mut stdin = self.inner.lock().await;
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await
    }
}

/// Per-session stderr file. Deleted when dropped.
#[derive(Debug)]
pub struct StderrCapture {
    file: NamedTempFile,
}

impl StderrCapture {
    pub fn create() -> io::Result<Self> {
        let file = tempfile::Builder::new()
            .prefix("quickedit-agent-")
            .suffix(".stderr")
            .tempfile()?;
        Ok(Self { file })
    }

    /// A second handle to the file for the child to write into.
    pub fn writer(&self) -> io::Result<File> {
        self.file.reopen()
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Current contents, lossily decoded. Empty if the file cannot be read.
    pub fn snapshot(&self) -> String {
        read_lossy(self.path())
    }
}

/// Read a file as lossy UTF-8, empty on any error.
pub fn read_lossy(path: &Path) -> String {
    std::fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Newline-delimited reader over the agent's stdout.
///
/// Invalid UTF-8 is replaced rather than treated as an error.
pub struct LineReader<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::new(),
        }
    }

    /// Next line without its terminator, or `None` at EOF.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.buf.clear();
        let read = self.reader.read_until(b'\n', &mut self.buf).await?;
        if read == 0 {
            return Ok(None);
        }
        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }

    /// Feed every line to `on_line` until EOF, a read error, or `Break`.
    ///
    /// Returns true if the stream reached EOF (or failed), false on `Break`.
    pub async fn pump<F>(mut self, mut on_line: F) -> bool
    where
        F: FnMut(String) -> ControlFlow<()>,
    {
        loop {
            match self.next_line().await {
                Ok(Some(line)) => {
                    if on_line(line).is_break() {
                        return false;
                    }
                }
                Ok(None) => return true,
                Err(e) => {
                    tracing::warn!(error = %e, "agent stdout read failed");
                    return true;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
