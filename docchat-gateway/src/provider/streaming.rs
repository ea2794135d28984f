//! Decoding of OpenAI-style `text/event-stream` completion responses.

use super::{ChatStream, ProviderError};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;
use std::pin::Pin;

/// Incremental decoder turning raw SSE bytes into content deltas.
///
/// Bytes are buffered until a full line is available, so chunk boundaries
/// that split a line (or a multi-byte character) are handled.
#[derive(Debug, Default)]
pub struct SseDeltaDecoder {
    buffer: Vec<u8>,
    done: bool,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<StreamErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamErrorBody {
    message: String,
}

impl SseDeltaDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` marker has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed raw bytes, returning the content deltas completed by them.
    ///
    /// Decoding stops at the first error, which is the last item returned.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Result<String, String>> {
        self.buffer.extend_from_slice(bytes);

        let mut deltas = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if self.done {
                continue;
            }
            match self.decode_line(&String::from_utf8_lossy(&line)) {
                Ok(Some(delta)) => deltas.push(Ok(delta)),
                Ok(None) => {}
                Err(message) => {
                    self.done = true;
                    self.buffer.clear();
                    deltas.push(Err(message));
                }
            }
        }

        deltas
    }

    /// Decode whatever is left once the byte stream ends.
    pub fn finish(&mut self) -> Result<Option<String>, String> {
        let rest = std::mem::take(&mut self.buffer);
        if self.done || rest.is_empty() {
            return Ok(None);
        }
        self.decode_line(&String::from_utf8_lossy(&rest))
    }

    fn decode_line(&mut self, line: &str) -> Result<Option<String>, String> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() || line.starts_with(':') {
            return Ok(None);
        }

        let Some(data) = line.strip_prefix("data:") else {
            // event:, id:, retry: fields carry nothing we use
            return Ok(None);
        };
        let data = data.trim();

        if data == "[DONE]" {
            self.done = true;
            return Ok(None);
        }

        let chunk: StreamChunk = serde_json::from_str(data)
            .map_err(|e| format!("Failed to parse stream chunk: {}", e))?;

        if let Some(error) = chunk.error {
            return Err(error.message);
        }

        Ok(chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty()))
    }
}

type ByteStream<B> = Pin<Box<dyn Stream<Item = reqwest::Result<B>> + Send>>;

struct DeltaState<B> {
    inner: ByteStream<B>,
    decoder: SseDeltaDecoder,
    pending: VecDeque<Result<String, ProviderError>>,
    finished: bool,
    provider: String,
    model: String,
}

impl<B> DeltaState<B> {
    fn error(&self, message: impl Into<String>) -> ProviderError {
        ProviderError::new(self.provider.clone(), self.model.clone(), message)
    }

    fn fail(&mut self, message: impl Into<String>) {
        let err = self.error(message);
        self.pending.push_back(Err(err));
        self.finished = true;
    }
}

/// Wrap a response byte stream into a stream of content deltas.
///
/// The stream ends after `[DONE]`, after the body ends, or right after the
/// first error item.
pub(crate) fn delta_stream<B>(
    inner: ByteStream<B>,
    provider: impl Into<String>,
    model: impl Into<String>,
) -> ChatStream
where
    B: AsRef<[u8]> + Send + 'static,
{
    let state = DeltaState {
        inner,
        decoder: SseDeltaDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
        provider: provider.into(),
        model: model.into(),
    };

    Box::pin(futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.inner.next().await {
                Some(Ok(bytes)) => {
                    for delta in state.decoder.feed(bytes.as_ref()) {
                        match delta {
                            Ok(text) => state.pending.push_back(Ok(text)),
                            Err(message) => state.fail(message),
                        }
                    }
                    if state.decoder.is_done() {
                        state.finished = true;
                    }
                }
                Some(Err(e)) => state.fail(format!("Stream interrupted: {}", e)),
                None => {
                    match state.decoder.finish() {
                        Ok(Some(delta)) => state.pending.push_back(Ok(delta)),
                        Ok(None) => {}
                        Err(message) => state.fail(message),
                    }
                    state.finished = true;
                }
            }
        }
    }))
}
