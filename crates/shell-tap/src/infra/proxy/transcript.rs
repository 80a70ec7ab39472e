//! Bounded, normalized session transcript.

use std::collections::VecDeque;
use std::fs::File;
use std::io;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;
use std::sync::Mutex;

use crate::common::mutex_lock_or_recover;
use crate::infra::terminal::normalize;

/// Keeps the last `max_lines` normalized lines of terminal output,
/// rewriting the whole backing file on every flush so readers always see a
/// complete, bounded transcript. Rewriting costs O(max_lines) per flush, but
/// flushes are coalesced per pty read and the bound is small; in exchange
/// disk usage stays constant no matter how long the session runs.
///
/// An internal mutex serializes writes so the writer can be shared across
/// the copy tasks.
pub struct TranscriptWriter {
    inner: Mutex<TranscriptState>,
}

struct TranscriptState {
    file: File,
    max_lines: usize,
    lines: VecDeque<String>,
    pending: Vec<u8>,
}

impl TranscriptWriter {
    /// `max_lines == 0` keeps every line.
    pub fn new(file: File, max_lines: usize) -> Self {
        Self {
            inner: Mutex::new(TranscriptState {
                file,
                max_lines,
                lines: VecDeque::new(),
                pending: Vec::new(),
            }),
        }
    }

    /// Buffers `data`, completes any newline-terminated segments through the
    /// normalizer into the line ring, and rewrites the backing file. Bytes
    /// after the last newline stay buffered for the next call.
    pub fn write(&self, data: &[u8]) -> io::Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }
        let mut state = mutex_lock_or_recover(&self.inner);
        state.pending.extend_from_slice(data);
        while let Some(pos) = state.pending.iter().position(|&b| b == b'\n') {
            let segment: Vec<u8> = state.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&segment);
            state.push_normalized(&text);
        }
        state.flush()?;
        Ok(data.len())
    }
}

impl TranscriptState {
    fn push_normalized(&mut self, segment: &str) {
        let normalized = normalize(segment);
        // VT/FF expand into extra breaks, so one segment may carry several
        // lines.
        let trimmed = normalized.strip_suffix('\n').unwrap_or(&normalized);
        for line in trimmed.split('\n') {
            self.lines.push_back(line.to_string());
            if self.max_lines > 0 && self.lines.len() > self.max_lines {
                self.lines.pop_front();
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        for line in &self.lines {
            self.file.write_all(line.as_bytes())?;
            self.file.write_all(b"\n")?;
        }
        self.file.flush()
    }
}
