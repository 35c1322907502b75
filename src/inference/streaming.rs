//! SSE streaming response parser for chat completions.
//!
//! Reads the HTTP body as a byte stream, splits on SSE boundaries
//! (`data: …\n\n`), parses each event as a `ChatCompletionChunk` and yields
//! one [`StreamChunk`] per event that carries answer text, reasoning text or a
//! finish reason. `data: [DONE]` ends the stream.

use std::fmt::Display;

use futures::stream::{self, Stream, StreamExt};

use super::errors::InferenceError;
use super::types::ChatCompletionChunk;

/// One parsed streaming delta.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamChunk {
    /// Incremental answer text.
    pub token: Option<String>,
    /// Incremental deliberation text (DeepSeek / Qwen `reasoning_content`).
    pub reasoning: Option<String>,
    /// Why the model stopped, on the final chunk.
    pub finish_reason: Option<String>,
}

impl StreamChunk {
    fn is_empty(&self) -> bool {
        self.token.is_none() && self.reasoning.is_none() && self.finish_reason.is_none()
    }
}

/// Parse a `reqwest::Response` body as an SSE chat-completion stream.
pub fn parse_sse_stream(
    response: reqwest::Response,
) -> impl Stream<Item = Result<StreamChunk, InferenceError>> {
    parse_sse_bytes(response.bytes_stream())
}

/// Parse any byte-chunk stream as SSE. Chunk boundaries may fall anywhere,
/// including inside a multi-byte character.
pub fn parse_sse_bytes<S, B, E>(byte_stream: S) -> impl Stream<Item = Result<StreamChunk, InferenceError>>
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]>,
    E: Display,
{
    let state = StreamState::default();

    stream::unfold(
        (Box::pin(byte_stream), state, Vec::<u8>::new()),
        |(mut byte_stream, mut state, mut buffer)| async move {
            if state.done {
                return None;
            }
            loop {
                // Complete SSE event in the buffer?
                if let Some(event_end) = find_event_boundary(&buffer) {
                    let event: Vec<u8> = buffer.drain(..event_end + 2).collect();
                    let event = String::from_utf8_lossy(&event);

                    match state.process_event(&event) {
                        Some(chunk) => return Some((Ok(chunk), (byte_stream, state, buffer))),
                        None if state.done => return None,
                        None => continue, // keep-alive, comment, or empty delta
                    }
                }

                match byte_stream.next().await {
                    Some(Ok(bytes)) => {
                        // Normalize CRLF framing to LF.
                        buffer.extend(bytes.as_ref().iter().copied().filter(|b| *b != b'\r'));
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((
                            Err(InferenceError::StreamError {
                                reason: format!("stream read error: {e}"),
                            }),
                            (byte_stream, state, buffer),
                        ));
                    }
                    None => {
                        // Body ended without a trailing blank line.
                        state.done = true;
                        let rest = String::from_utf8_lossy(&buffer).trim().to_string();
                        buffer.clear();
                        if rest.is_empty() {
                            return None;
                        }
                        return state
                            .process_event(&rest)
                            .map(|chunk| (Ok(chunk), (byte_stream, state, buffer)));
                    }
                }
            }
        },
    )
}

fn find_event_boundary(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

// ─── Stream State ────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct StreamState {
    /// `[DONE]` seen or the body ended.
    done: bool,
}

impl StreamState {
    /// Process a single SSE event (may contain multiple `data:` lines).
    fn process_event(&mut self, event: &str) -> Option<StreamChunk> {
        let mut data_content = String::new();

        for line in event.lines() {
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if data == "[DONE]" {
                    self.done = true;
                    return None;
                }
                data_content.push_str(data);
            }
            // `event:`, `id:` and `:` comment lines carry nothing we use.
        }

        if data_content.is_empty() {
            return None;
        }

        let chunk: ChatCompletionChunk = match serde_json::from_str(&data_content) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unparsable SSE chunk");
                return None;
            }
        };

        let choice = chunk.choices.into_iter().next()?;
        let result = StreamChunk {
            token: choice.delta.content.filter(|c| !c.is_empty()),
            reasoning: choice.delta.reasoning_content.filter(|c| !c.is_empty()),
            finish_reason: choice.finish_reason,
        };

        if result.is_empty() {
            None
        } else {
            Some(result)
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
