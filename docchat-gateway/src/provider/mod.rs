//! Completion provider abstraction.
//!
//! The relay only needs one capability from an LLM backend: take an ordered
//! message list and hand back text fragments as they are generated.

mod compatible;
mod streaming;

pub use compatible::CompatibleProvider;
pub use streaming::SseDeltaDecoder;

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

// ============================================================================
// Provider Trait
// ============================================================================

/// Incremental text fragments of one completion.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// Unified interface for streaming LLM providers.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Start a streaming chat completion.
    ///
    /// Errors returned here happen before the first fragment (connection,
    /// authentication, bad status). Errors after that arrive as stream items.
    async fn chat_stream(&self, request: ChatRequest) -> Result<ChatStream, ProviderError>;
}

/// Error from a provider.
#[derive(Debug, Clone, thiserror::Error)]
#[error("[{provider}:{model}] {message}")]
pub struct ProviderError {
    pub provider: String,
    pub model: String,
    pub message: String,
    pub status_code: Option<u16>,
}

impl ProviderError {
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            message: message.into(),
            status_code: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }
}

impl From<ProviderError> for docchat_common::Error {
    fn from(err: ProviderError) -> Self {
        docchat_common::Error::Upstream(err.message)
    }
}

// ============================================================================
// Request Types
// ============================================================================

/// Unified chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model to use
    pub model: String,
    /// Messages in the conversation
    pub messages: Vec<Message>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
    /// Temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// A message in the conversation, as sent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl From<&crate::session::ChatMessage> for Message {
    fn from(message: &crate::session::ChatMessage) -> Self {
        Self {
            role: message.role.as_str().to_string(),
            content: message.content.clone(),
        }
    }
}
