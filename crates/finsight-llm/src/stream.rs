//! Incremental response streams
//!
//! Backends deliver streamed completions as line-delimited payloads (SSE
//! `data:` lines for OpenAI-compatible servers, NDJSON for Ollama). This module
//! turns a raw byte stream into a [`TextStream`] of text fragments, ending only
//! when the backend signals completion.

use crate::{LLMError, Result};
use futures::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

/// A finite stream of text fragments for one completion
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Outcome of parsing one line of a streamed response
#[derive(Debug)]
pub enum LineEvent {
    /// Line carries nothing of interest (keep-alive, comment, role header)
    Skip,
    /// A text fragment
    Text(String),
    /// A final text fragment followed by end of completion
    Finished(Option<String>),
    /// The line reported a backend error
    Failed(LLMError),
}

/// Byte buffer that yields complete newline-terminated lines
///
/// Bytes are kept until a full line is available so multi-byte UTF-8
/// sequences split across network chunks decode correctly.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every complete line
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]);
            lines.push(text.trim_end_matches('\r').to_string());
        }
        lines
    }

    /// Take whatever is left once the byte stream has ended
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string())
    }
}

struct LineStreamState<F> {
    inner: Pin<Box<dyn Stream<Item = std::result::Result<Vec<u8>, String>> + Send>>,
    buffer: LineBuffer,
    pending: VecDeque<Result<String>>,
    parse: F,
    finished: bool,
}

impl<F> LineStreamState<F>
where
    F: FnMut(&str) -> LineEvent,
{
    /// Parse a line, queueing any output; returns `true` once completion was signalled
    fn consume(&mut self, line: &str) -> bool {
        if line.trim().is_empty() {
            return false;
        }
        match (self.parse)(line) {
            LineEvent::Skip => false,
            LineEvent::Text(text) => {
                if !text.is_empty() {
                    self.pending.push_back(Ok(text));
                }
                false
            }
            LineEvent::Finished(text) => {
                if let Some(text) = text.filter(|t| !t.is_empty()) {
                    self.pending.push_back(Ok(text));
                }
                true
            }
            LineEvent::Failed(err) => {
                self.pending.push_back(Err(err));
                true
            }
        }
    }
}

/// Build a [`TextStream`] from a raw byte stream and a per-line parser
///
/// The resulting stream yields fragments in arrival order. If the byte stream
/// ends before `parse` reports [`LineEvent::Finished`], a final
/// [`LLMError::StreamInterrupted`] is yielded.
pub fn line_stream<S, B, E, F>(bytes: S, parse: F) -> TextStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]>,
    E: Display,
    F: FnMut(&str) -> LineEvent + Send + 'static,
{
    let inner = bytes
        .map(|chunk| chunk.map(|b| b.as_ref().to_vec()).map_err(|e| e.to_string()))
        .boxed();

    let state = LineStreamState {
        inner,
        buffer: LineBuffer::new(),
        pending: VecDeque::new(),
        parse,
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.inner.next().await {
                Some(Ok(chunk)) => {
                    for line in state.buffer.push(&chunk) {
                        if state.consume(&line) {
                            state.finished = true;
                            break;
                        }
                    }
                }
                Some(Err(e)) => {
                    state.finished = true;
                    state
                        .pending
                        .push_back(Err(LLMError::StreamInterrupted(e)));
                }
                None => {
                    state.finished = true;
                    let completed = match state.buffer.finish() {
                        Some(rest) => state.consume(&rest),
                        None => false,
                    };
                    if !completed {
                        state.pending.push_back(Err(LLMError::StreamInterrupted(
                            "connection closed before completion".to_string(),
                        )));
                    }
                }
            }
        }
    })
    .boxed()
}
