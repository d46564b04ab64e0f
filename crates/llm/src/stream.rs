//! Line-oriented decoding of provider response bodies into [`LlmEvent`]s.
//!
//! Both SSE (`data: {...}`) and NDJSON bodies are line framed; providers only
//! supply a [`FrameDecoder`] that turns one complete line into events.

use crate::client::{LlmEvent, LlmStream};
use futures::{Stream, StreamExt};
use profrag_core::{AppError, AppResult};
use std::collections::VecDeque;
use std::pin::Pin;

/// Result of decoding one line.
#[derive(Debug, Default)]
pub(crate) struct LineOutcome {
    pub events: Vec<LlmEvent>,

    /// No further lines are expected
    pub terminal: bool,
}

impl LineOutcome {
    pub fn events(events: Vec<LlmEvent>) -> Self {
        Self {
            events,
            terminal: false,
        }
    }

    pub fn terminal() -> Self {
        Self {
            events: Vec::new(),
            terminal: true,
        }
    }
}

/// Provider-specific line decoder.
pub(crate) trait FrameDecoder: Send + 'static {
    /// Decode one complete, non-empty line.
    fn on_line(&mut self, line: &str) -> AppResult<LineOutcome>;

    /// Emit the trailing events (tool calls, then `Done`).
    fn finish(&mut self) -> AppResult<Vec<LlmEvent>>;
}

/// Splits a byte stream into lines without breaking multi-byte characters.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    /// Append bytes and return every complete non-blank line.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(|c| c == '\n' || c == '\r');
            if !line.trim().is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }

    /// Whatever is left once the body ends without a trailing newline.
    pub fn take_rest(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = String::from_utf8_lossy(&rest);
        let rest = rest.trim();
        if rest.is_empty() {
            None
        } else {
            Some(rest.to_string())
        }
    }
}

struct DecodeState<D> {
    bytes: Pin<Box<dyn Stream<Item = Result<Vec<u8>, String>> + Send>>,
    lines: LineBuffer,
    decoder: D,
    pending: VecDeque<AppResult<LlmEvent>>,
    finished: bool,
}

impl<D: FrameDecoder> DecodeState<D> {
    fn handle_line(&mut self, line: &str) {
        if self.finished {
            return;
        }

        match self.decoder.on_line(line) {
            Ok(outcome) => {
                self.pending.extend(outcome.events.into_iter().map(Ok));
                if outcome.terminal {
                    self.finish();
                }
            }
            Err(e) => {
                self.pending.push_back(Err(e));
                self.finished = true;
            }
        }
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }

        match self.decoder.finish() {
            Ok(events) => self.pending.extend(events.into_iter().map(Ok)),
            Err(e) => self.pending.push_back(Err(e)),
        }
        self.finished = true;
    }
}

/// Drive `decoder` over a response body, yielding events as lines complete.
///
/// The stream ends after the decoder's trailing events or after the first
/// error. A body that ends before its terminal line yields an error, so a
/// truncated response is never reported as complete.
pub(crate) fn event_stream<S, B, E, D>(bytes: S, decoder: D) -> LlmStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
    D: FrameDecoder,
{
    let bytes = bytes.map(|chunk| {
        chunk
            .map(|b| b.as_ref().to_vec())
            .map_err(|e| e.to_string())
    });

    let state = DecodeState {
        bytes: Box::pin(bytes),
        lines: LineBuffer::default(),
        decoder,
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(bytes)) => {
                    for line in state.lines.push(&bytes) {
                        state.handle_line(&line);
                    }
                }
                Some(Err(e)) => {
                    state
                        .pending
                        .push_back(Err(AppError::Llm(format!("Stream error: {}", e))));
                    state.finished = true;
                }
                None => {
                    if let Some(rest) = state.lines.take_rest() {
                        state.handle_line(&rest);
                    }
                    if !state.finished {
                        state.pending.push_back(Err(AppError::Llm(
                            "Model stream ended before completion".to_string(),
                        )));
                        state.finished = true;
                    }
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{LlmCompletion, LlmUsage};

    /// Treats each line as a delta; "END" terminates.
    struct EchoDecoder {
        text: String,
    }

    impl FrameDecoder for EchoDecoder {
        fn on_line(&mut self, line: &str) -> AppResult<LineOutcome> {
            if line == "END" {
                return Ok(LineOutcome::terminal());
            }
            if line == "BAD" {
                return Err(AppError::Llm("bad line".to_string()));
            }
            self.text.push_str(line);
            Ok(LineOutcome::events(vec![LlmEvent::TextDelta(line.to_string())]))
        }

        fn finish(&mut self) -> AppResult<Vec<LlmEvent>> {
            Ok(vec![LlmEvent::Done(LlmCompletion {
                content: self.text.clone(),
                model: "echo".to_string(),
                tool_calls: Vec::new(),
                usage: LlmUsage::default(),
            })])
        }
    }

    fn body(parts: &[&str]) -> impl Stream<Item = Result<Vec<u8>, String>> + Send + 'static {
        let parts: Vec<Result<Vec<u8>, String>> =
            parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        futures::stream::iter(parts)
    }

    #[test]
    fn test_line_buffer_joins_split_lines() {
        let mut lines = LineBuffer::default();
        assert!(lines.push(b"hel").is_empty());
        assert_eq!(lines.push(b"lo\r\nwor"), vec!["hello".to_string()]);
        assert_eq!(lines.push(b"ld\n\n"), vec!["world".to_string()]);
        assert_eq!(lines.take_rest(), None);
    }

    #[test]
    fn test_line_buffer_keeps_multibyte_chars() {
        let mut lines = LineBuffer::default();
        let text = "caf\u{e9}\n".as_bytes();
        let (a, b) = text.split_at(4);
        assert!(lines.push(a).is_empty());
        assert_eq!(lines.push(b), vec!["caf\u{e9}".to_string()]);
    }

    #[tokio::test]
    async fn test_event_stream_emits_deltas_then_done() {
        let decoder = EchoDecoder {
            text: String::new(),
        };
        let events: Vec<_> = event_stream(body(&["a\nb", "\nEND\nignored\n"]), decoder)
            .collect()
            .await;

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].as_ref().unwrap(), &LlmEvent::TextDelta("a".to_string()));
        assert_eq!(events[1].as_ref().unwrap(), &LlmEvent::TextDelta("b".to_string()));
        match events[2].as_ref().unwrap() {
            LlmEvent::Done(done) => assert_eq!(done.content, "ab"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_event_stream_truncated_body_is_an_error() {
        let decoder = EchoDecoder {
            text: String::new(),
        };
        let events: Vec<_> = event_stream(body(&["Dr. Smith is\n"]), decoder).collect().await;

        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &LlmEvent::TextDelta("Dr. Smith is".to_string())
        );
        assert!(matches!(events[1], Err(AppError::Llm(_))));
        assert!(!events.iter().any(|e| matches!(e, Ok(LlmEvent::Done(_)))));
    }

    #[tokio::test]
    async fn test_event_stream_terminal_line_without_newline() {
        let decoder = EchoDecoder {
            text: String::new(),
        };
        let events: Vec<_> = event_stream(body(&["x\nEND"]), decoder).collect().await;

        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], Ok(LlmEvent::Done(_))));
    }

    #[tokio::test]
    async fn test_event_stream_stops_after_error() {
        let decoder = EchoDecoder {
            text: String::new(),
        };
        let events: Vec<_> = event_stream(body(&["a\nBAD\nb\n"]), decoder).collect().await;

        assert_eq!(events.len(), 2);
        assert!(events[0].is_ok());
        assert!(events[1].is_err());
    }
}
