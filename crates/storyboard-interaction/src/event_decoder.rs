//! Server-sent event framing.
//!
//! Bytes are appended to a rolling buffer and split on the blank-line
//! delimiter. Each complete segment contributes its `data:` lines; the joined
//! data is parsed as JSON. Segments without data are ignored, a segment that
//! fails to parse yields a decode error and the stream carries on.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use serde_json::Value;
use std::collections::VecDeque;
use storyboard_core::{ByteStream, Result, StoryboardError};

const DELIMITER: &[u8] = b"\n\n";
const DATA_PREFIX: &str = "data:";

/// Incremental decoder; keeps the partial trailing segment between reads.
#[derive(Debug, Default)]
pub struct EventDecoder {
    buffer: Vec<u8>,
    /// Bytes already searched for a delimiter without a match.
    scanned: usize,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns every event it completed.
    ///
    /// The buffer holds raw bytes, so a multi-byte character split across
    /// chunks is only decoded once whole.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<Value>> {
        self.buffer
            .extend(chunk.iter().copied().filter(|byte| *byte != b'\r'));

        let mut events = Vec::new();
        loop {
            // A delimiter may straddle the old tail and the new chunk.
            let start = self.scanned.saturating_sub(DELIMITER.len() - 1);
            let Some(offset) = find_delimiter(&self.buffer[start..]) else {
                self.scanned = self.buffer.len();
                break;
            };
            let position = start + offset;
            let mut segment: Vec<u8> = self.buffer.drain(..position + DELIMITER.len()).collect();
            segment.truncate(position);
            self.scanned = 0;
            if let Some(event) = decode_segment(&segment) {
                events.push(event);
            }
        }
        events
    }

    /// Flushes a final segment that was never followed by a delimiter.
    pub fn finish(&mut self) -> Option<Result<Value>> {
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        if rest.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        decode_segment(&rest)
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

fn find_delimiter(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(DELIMITER.len())
        .position(|window| window == DELIMITER)
}

fn decode_segment(segment: &[u8]) -> Option<Result<Value>> {
    let text = match std::str::from_utf8(segment) {
        Ok(text) => text,
        Err(err) => {
            return Some(Err(StoryboardError::decode(
                String::from_utf8_lossy(segment),
                format!("invalid UTF-8: {}", err),
            )));
        }
    };

    let mut data: Option<String> = None;
    for line in text.split('\n') {
        let Some(rest) = line.strip_prefix(DATA_PREFIX) else {
            continue;
        };
        let rest = rest.strip_prefix(' ').unwrap_or(rest);
        match data.as_mut() {
            Some(joined) => {
                joined.push('\n');
                joined.push_str(rest);
            }
            None => data = Some(rest.to_string()),
        }
    }

    let data = data?;
    Some(
        serde_json::from_str(&data)
            .map_err(|err| StoryboardError::decode(data.clone(), err.to_string())),
    )
}

/// Lazily decodes an event byte stream.
///
/// Yields `Ok(value)` per event and `Err` for undecodable segments (the
/// sequence continues). A transport error from the underlying stream is
/// yielded once and ends the sequence. The sequence also ends when the
/// server closes the stream.
pub fn decode_events(bytes: ByteStream) -> impl Stream<Item = Result<Value>> + Send {
    struct State {
        bytes: ByteStream,
        decoder: EventDecoder,
        ready: VecDeque<Result<Value>>,
        finished: bool,
    }

    let initial = State {
        bytes,
        decoder: EventDecoder::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    stream::unfold(initial, |mut state| async move {
        loop {
            if let Some(event) = state.ready.pop_front() {
                return Some((event, state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.push(&chunk);
                    state.ready.extend(events);
                }
                Some(Err(err)) => {
                    state.finished = true;
                    state.ready.push_back(Err(err));
                }
                None => {
                    state.finished = true;
                    if let Some(last) = state.decoder.finish() {
                        state.ready.push_back(last);
                    }
                }
            }
        }
    })
}

/// Wraps in-memory chunks as a [`ByteStream`].
pub fn byte_stream_from_chunks<I>(chunks: I) -> ByteStream
where
    I: IntoIterator<Item = Result<Bytes>>,
    I::IntoIter: Send + 'static,
{
    Box::pin(stream::iter(chunks))
}
