//! Incremental decoder for `data: <json>` progress streams.
//!
//! Bytes arrive in arbitrary chunks. A multi-byte UTF-8 character split across
//! two chunks is held back until the rest of it arrives, complete lines are
//! cut on `\n`, and every `data: ` line is parsed as a [`ProgressFrame`].
//! Malformed lines are logged and skipped; they never end the stream.

use std::collections::VecDeque;

use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use tracing::debug;

use crate::core::models::ProgressFrame;
use crate::error::JobError;

/// Byte stream of a bulk job response body.
pub type ByteStream = BoxStream<'static, Result<Bytes, JobError>>;

const DATA_PREFIX: &str = "data: ";

/// Push-based frame decoder. Feed chunks with [`push`](Self::push) and call
/// [`finish`](Self::finish) once the byte stream is exhausted.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Undecoded tail of the previous chunk (an incomplete UTF-8 sequence)
    pending: Vec<u8>,
    /// Decoded text not yet terminated by a newline
    buffer: String,
    malformed: u64,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `data:` lines skipped because they did not parse.
    pub fn malformed(&self) -> u64 {
        self.malformed
    }

    /// Decode a chunk and return every frame completed by it, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<ProgressFrame> {
        self.decode_utf8(chunk);

        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            if let Some(frame) = self.parse_line(&line[..line.len() - 1]) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Flush whatever is left once the stream has ended.
    ///
    /// An unterminated last line is still decoded; an incomplete trailing
    /// UTF-8 sequence becomes U+FFFD.
    pub fn finish(&mut self) -> Option<ProgressFrame> {
        if !self.pending.is_empty() {
            let tail = std::mem::take(&mut self.pending);
            self.buffer.push_str(&String::from_utf8_lossy(&tail));
        }
        let line = std::mem::take(&mut self.buffer);
        self.parse_line(&line)
    }

    fn decode_utf8(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);

        let mut start = 0;
        while start < self.pending.len() {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    start = self.pending.len();
                }
                Err(e) => {
                    let valid_end = start + e.valid_up_to();
                    self.buffer
                        .push_str(&String::from_utf8_lossy(&self.pending[start..valid_end]));
                    match e.error_len() {
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + len;
                        }
                        // Incomplete sequence at the end: wait for the next chunk
                        None => {
                            start = valid_end;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..start);
    }

    fn parse_line(&mut self, line: &str) -> Option<ProgressFrame> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let payload = line.strip_prefix(DATA_PREFIX)?;

        match serde_json::from_str::<ProgressFrame>(payload) {
            Ok(frame) => Some(frame),
            Err(source) => {
                self.malformed += 1;
                let err = JobError::FrameParse {
                    line: payload.to_string(),
                    source,
                };
                debug!(error = %err, "Skipping progress frame");
                None
            }
        }
    }
}

struct DecodeState {
    bytes: ByteStream,
    decoder: FrameDecoder,
    ready: VecDeque<ProgressFrame>,
    done: bool,
}

/// Turn a response body into a lazy, non-restartable sequence of frames.
///
/// The sequence ends when the body ends, whether or not a final frame was
/// seen. A transport error is yielded once and ends the sequence.
pub fn decode_frames(bytes: ByteStream) -> impl Stream<Item = Result<ProgressFrame, JobError>> + Send {
    let state = DecodeState {
        bytes,
        decoder: FrameDecoder::new(),
        ready: VecDeque::new(),
        done: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.ready.pop_front() {
                return Some((Ok(frame), state));
            }
            if state.done {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    state.ready.extend(state.decoder.push(&chunk));
                }
                Some(Err(e)) => {
                    state.done = true;
                    state.ready.clear();
                    return Some((Err(e), state));
                }
                None => {
                    state.done = true;
                    state.ready.extend(state.decoder.finish());
                    if state.decoder.malformed() > 0 {
                        debug!(
                            skipped = state.decoder.malformed(),
                            "Progress stream ended with malformed frames"
                        );
                    }
                }
            }
        }
    })
}
