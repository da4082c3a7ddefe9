// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Wire transcript shared by every session of one runtime.
//!
//! Frames are numbered under the same lock that appends them to the JSONL
//! transcript, so `seq` order and file order always agree even when the
//! stdout reader task and a caller record at the same time.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use parking_lot::Mutex;

use crate::frame::{CapturedFrame, Direction};

struct Transcript {
    frames: Vec<CapturedFrame>,
    sink: Option<BufWriter<File>>,
}

impl Transcript {
    fn append(&mut self, frame: CapturedFrame) {
        if let Some(sink) = self.sink.as_mut() {
            // Stop streaming after the first failed write; memory keeps everything.
            if write_jsonl(sink, &frame).is_err() {
                self.sink = None;
            }
        }
        self.frames.push(frame);
    }
}

fn write_jsonl(sink: &mut BufWriter<File>, frame: &CapturedFrame) -> std::io::Result<()> {
    let json = serde_json::to_string(frame)?;
    writeln!(sink, "{json}")?;
    sink.flush()
}

/// Cheaply cloneable recorder of agent wire traffic.
///
/// Clones share one transcript; the runtime hands a clone to each session.
#[derive(Clone)]
pub struct CaptureLog {
    start: Instant,
    transcript: Arc<Mutex<Transcript>>,
}

impl CaptureLog {
    /// In-memory transcript.
    pub fn new() -> Self {
        Self::with_sink(None)
    }

    /// Transcript that is also streamed to `path`, one JSON frame per line.
    pub fn with_file(path: &Path) -> std::io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::with_sink(Some(BufWriter::new(file))))
    }

    fn with_sink(sink: Option<BufWriter<File>>) -> Self {
        Self {
            start: Instant::now(),
            transcript: Arc::new(Mutex::new(Transcript {
                frames: Vec::new(),
                sink,
            })),
        }
    }

    /// Record one line seen on the wire for agent `session`.
    pub fn record(&self, session: u64, direction: Direction, line: impl Into<String>) {
        let mut transcript = self.transcript.lock();
        let frame = CapturedFrame {
            seq: transcript.frames.len() as u64,
            timestamp: SystemTime::now(),
            elapsed: self.start.elapsed(),
            session,
            direction,
            line: line.into(),
        };
        transcript.append(frame);
    }

    pub fn frames(&self) -> Vec<CapturedFrame> {
        self.transcript.lock().frames.clone()
    }

    /// Frames exchanged with one agent process.
    pub fn session(&self, session: u64) -> Vec<CapturedFrame> {
        self.matching(|f| f.session == session)
    }

    pub fn count(&self, pred: impl Fn(&CapturedFrame) -> bool) -> usize {
        self.transcript.lock().frames.iter().filter(|f| pred(f)).count()
    }

    /// JSON-RPC methods the client sent, in wire order. Replies carry no
    /// method and are skipped.
    pub fn outgoing_methods(&self) -> Vec<String> {
        self.transcript
            .lock()
            .frames
            .iter()
            .filter(|f| f.direction == Direction::Outgoing)
            .filter_map(CapturedFrame::method)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.transcript.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn matching(&self, pred: impl Fn(&CapturedFrame) -> bool) -> Vec<CapturedFrame> {
        self.transcript
            .lock()
            .frames
            .iter()
            .filter(|f| pred(f))
            .cloned()
            .collect()
    }
}

impl Default for CaptureLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CaptureLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let transcript = self.transcript.lock();
        f.debug_struct("CaptureLog")
            .field("frames", &transcript.frames.len())
            .field("file", &transcript.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
