//! Server-sent-event decoding for the chat streaming endpoint
//!
//! The response body arrives as arbitrary byte chunks. Lines are buffered
//! until complete, and every `data:` line carries one JSON payload, either
//! `{"text": ...}` or `{"error": ...}`.

use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{stream, Stream, StreamExt};
use serde::Deserialize;

const DATA_PREFIX: &str = "data:";

/// A decoded record from the streaming transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// An incremental fragment of assistant text
    Delta(String),
    /// A failure reported by the server (or a broken read)
    Error(String),
    /// The response body ended
    Done,
}

#[derive(Deserialize)]
struct Payload {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Incremental line decoder. Feed it chunks in arrival order.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    parse_failures: usize,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `data:` lines whose payload was not valid JSON
    pub fn parse_failures(&self) -> usize {
        self.parse_failures
    }

    /// Append a chunk and return the events of every line it completed.
    /// An incomplete trailing line stays buffered for the next chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.decode_line(&line[..pos], &mut events);
        }
        events
    }

    /// Flush whatever is left in the buffer and mark the end of the stream
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.decode_line(&line, &mut events);
        }
        events.push(StreamEvent::Done);
        events
    }

    fn decode_line(&mut self, raw: &[u8], events: &mut Vec<StreamEvent>) {
        // Lines are only decoded once complete, so split multi-byte chars are whole again
        let decoded = String::from_utf8_lossy(raw);
        let line = decoded.trim_end_matches('\r');

        let Some(data) = line.strip_prefix(DATA_PREFIX) else {
            return;
        };

        match serde_json::from_str::<Payload>(data) {
            Ok(payload) => {
                if let Some(text) = payload.text.filter(|t| !t.is_empty()) {
                    events.push(StreamEvent::Delta(text));
                }
                if let Some(error) = payload.error {
                    events.push(StreamEvent::Error(error));
                }
            }
            Err(e) => {
                self.parse_failures += 1;
                tracing::warn!(error = %e, line = %line, "Failed to parse event payload");
            }
        }
    }
}

struct DecodeState<S> {
    body: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<StreamEvent>,
    done: bool,
}

/// Adapt a response body into an ordered stream of events.
///
/// Ends with `Done` when the body completes. A read error yields a single
/// `Error` and ends the stream without `Done`.
pub fn decode_stream<S, E>(body: S) -> impl Stream<Item = StreamEvent>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let state = DecodeState {
        body: Box::pin(body),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                return Some((event, state));
            }
            if state.done {
                return None;
            }

            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.push(&chunk);
                    state.pending.extend(events);
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Stream read failed");
                    state
                        .pending
                        .push_back(StreamEvent::Error(format!("stream read failed: {}", e)));
                    state.done = true;
                }
                None => {
                    let events = state.decoder.finish();
                    state.pending.extend(events);
                    state.done = true;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(s: &str) -> StreamEvent {
        StreamEvent::Delta(s.to_string())
    }

    #[test]
    fn test_malformed_line_is_skipped() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: {\"text\": \"x\"}\ndata: not-json\n");
        assert_eq!(events, vec![delta("x")]);
        assert_eq!(decoder.parse_failures(), 1);
    }

    #[test]
    fn test_incomplete_line_is_held_back() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"te").is_empty());
        assert!(decoder.push(b"xt\": \"Hel").is_empty());
        assert_eq!(decoder.push(b"lo\"}\n\n"), vec![delta("Hello")]);
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        let line = "data: {\"text\": \"caf\u{e9}\"}\n".as_bytes();
        let split = line.iter().position(|&b| b == 0xc3).unwrap() + 1;

        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&line[..split]).is_empty());
        assert_eq!(decoder.push(&line[split..]), vec![delta("caf\u{e9}")]);
    }

    #[test]
    fn test_error_payload_and_crlf() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: {\"error\": \"model exploded\"}\r\n\r\n");
        assert_eq!(events, vec![StreamEvent::Error("model exploded".to_string())]);
        assert_eq!(decoder.parse_failures(), 0);
    }

    #[test]
    fn test_non_data_lines_and_empty_text_ignored() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": keepalive\nevent: message\ndata: {\"text\": \"\"}\ndata: {}\n");
        assert!(events.is_empty());
        assert_eq!(decoder.parse_failures(), 0);
    }

    #[test]
    fn test_finish_flushes_trailing_line() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"text\": \"tail\"}").is_empty());
        assert_eq!(decoder.finish(), vec![delta("tail"), StreamEvent::Done]);
    }

    #[tokio::test]
    async fn test_decode_stream_preserves_order() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"data: {\"text\": \"Hel\"}\n\ndata: {\"te")),
            Ok(Bytes::from_static(b"xt\": \"lo, \"}\n\ndata: broken\n")),
            Ok(Bytes::from_static(b"data: {\"text\": \"world\"}\n\n")),
        ];

        let events: Vec<StreamEvent> = decode_stream(stream::iter(chunks)).collect().await;
        assert_eq!(
            events,
            vec![delta("Hel"), delta("lo, "), delta("world"), StreamEvent::Done]
        );
    }

    #[tokio::test]
    async fn test_decode_stream_read_error_ends_stream() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"data: {\"text\": \"partial\"}\n")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from_static(b"data: {\"text\": \"never\"}\n")),
        ];

        let events: Vec<StreamEvent> = decode_stream(stream::iter(chunks)).collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], delta("partial"));
        assert!(matches!(&events[1], StreamEvent::Error(msg) if msg.contains("reset")));
    }
}
