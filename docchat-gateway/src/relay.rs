//! Chat relay.
//!
//! One call to [`ChatRelay::start_turn`] is one chat turn: the raw user
//! message is appended to the session, the provider is asked for a streaming
//! completion over the whole history, and every fragment is forwarded as a
//! [`RelayEvent`] on a bounded channel. Each turn ends with exactly one
//! terminal event, `done` or `error`.
//!
//! The assistant message is committed only when the provider stream is
//! exhausted. A failed or abandoned turn leaves just the user message behind.

use crate::provider::{ChatRequest, Message, Provider};
use crate::session::{ChatMessage, SessionHandle, TurnGuard};
use docchat_common::Config;
use futures_util::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::Instrument;

/// Capacity of the per-turn event channel.
const EVENT_BUFFER: usize = 64;

/// One frame of the chat stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RelayEvent {
    Chunk { chunk: String },
    Done { done: bool },
    Error { error: String },
}

impl RelayEvent {
    pub fn chunk(text: impl Into<String>) -> Self {
        Self::Chunk { chunk: text.into() }
    }

    pub fn done() -> Self {
        Self::Done { done: true }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }
}

/// Completion parameters applied to every turn.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: i64,
    /// Characters of document context injected into the prompt
    pub context_budget: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for RelaySettings {
    fn from(config: &Config) -> Self {
        Self {
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
            context_budget: config.document.context_budget_chars,
        }
    }
}

/// Build the text sent to the model for the latest user message.
///
/// Without a document the message is sent as is. With one, the first
/// `budget` characters of the document are wrapped around the question.
pub fn compose_prompt(message: &str, document_context: Option<&str>, budget: usize) -> String {
    let Some(context) = document_context else {
        return message.to_string();
    };

    let excerpt: String = context.chars().take(budget).collect();
    format!(
        "You have access to the following PDF document content:\n\n\
         {excerpt}...\n\n\
         User question: {message}\n\n\
         Please answer based on the PDF content if relevant, otherwise respond normally."
    )
}

/// Wire messages for the provider: the history, with the final user entry
/// replaced by `prompt`.
fn provider_messages(history: &[ChatMessage], prompt: &str) -> Vec<Message> {
    let mut messages: Vec<Message> = history.iter().map(Message::from).collect();
    if let Some(last) = messages.last_mut() {
        last.content = prompt.to_string();
    }
    messages
}

/// How a turn ended, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnOutcome {
    Completed { chunks: usize, chars: usize },
    Failed,
    Disconnected,
}

/// Streams completions for session turns.
pub struct ChatRelay {
    provider: Arc<dyn Provider>,
    settings: RelaySettings,
}

impl ChatRelay {
    pub fn new(provider: Arc<dyn Provider>, settings: RelaySettings) -> Self {
        Self { provider, settings }
    }

    /// Start a chat turn on `session`.
    ///
    /// Waits for any earlier turn on the same session, records the user
    /// message, and returns the receiving end of the event stream. The turn
    /// keeps the session claimed until its terminal event is sent or the
    /// receiver is dropped.
    pub async fn start_turn(
        &self,
        session: SessionHandle,
        message: String,
    ) -> mpsc::Receiver<RelayEvent> {
        let turn = session.begin_turn().await;
        let turn_id = uuid::Uuid::new_v4();

        let messages = {
            let mut state = session.write().await;
            let prompt = compose_prompt(
                &message,
                state.document_context(),
                self.settings.context_budget,
            );
            state.push(ChatMessage::user(message));
            provider_messages(state.history(), &prompt)
        };

        let request = ChatRequest {
            model: self.settings.model.clone(),
            messages,
            max_tokens: Some(self.settings.max_tokens),
            temperature: Some(self.settings.temperature),
        };

        let span = tracing::info_span!(
            "chat_turn",
            session_id = %session.id(),
            turn_id = %turn_id,
            provider = %self.provider.name(),
        );

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let provider = Arc::clone(&self.provider);

        tokio::spawn(
            async move {
                tracing::debug!(messages = request.messages.len(), "Turn started");
                match run_turn(provider, request, &session, &tx, turn).await {
                    TurnOutcome::Completed { chunks, chars } => {
                        tracing::info!(chunks, response_chars = chars, "Turn completed");
                    }
                    TurnOutcome::Failed => tracing::warn!("Turn failed"),
                    TurnOutcome::Disconnected => {
                        tracing::info!("Client disconnected, upstream generation cancelled");
                    }
                }
            }
            .instrument(span),
        );

        rx
    }
}

async fn run_turn(
    provider: Arc<dyn Provider>,
    request: ChatRequest,
    session: &SessionHandle,
    tx: &mpsc::Sender<RelayEvent>,
    _turn: TurnGuard,
) -> TurnOutcome {
    let mut stream = match provider.chat_stream(request).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(error = %e, status = ?e.status_code, "Provider request failed");
            let _ = tx
                .send(RelayEvent::error(docchat_common::Error::from(e).to_string()))
                .await;
            return TurnOutcome::Failed;
        }
    };

    let mut response = String::new();
    let mut chunks = 0;

    loop {
        let item = tokio::select! {
            item = stream.next() => item,
            _ = tx.closed() => return TurnOutcome::Disconnected,
        };

        match item {
            Some(Ok(text)) => {
                response.push_str(&text);
                chunks += 1;
                if tx.send(RelayEvent::chunk(text)).await.is_err() {
                    return TurnOutcome::Disconnected;
                }
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, chunks, "Provider stream failed");
                let _ = tx
                    .send(RelayEvent::error(docchat_common::Error::from(e).to_string()))
                    .await;
                return TurnOutcome::Failed;
            }
            None => break,
        }
    }

    let chars = response.chars().count();
    session.write().await.push(ChatMessage::assistant(response));
    let _ = tx.send(RelayEvent::done()).await;

    TurnOutcome::Completed { chunks, chars }
}
