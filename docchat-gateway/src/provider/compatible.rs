//! Generic OpenAI-compatible streaming provider.
//!
//! Groq, like most hosted LLM APIs, follows the `/v1/chat/completions`
//! format. With `"stream": true` the response body is a `text/event-stream`
//! of `data: {json}` chunks terminated by `data: [DONE]`.

use super::streaming::delta_stream;
use super::{ChatRequest, ChatStream, Message, Provider, ProviderError};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

/// A provider that speaks the OpenAI-compatible chat completions API.
pub struct CompatibleProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

#[derive(Debug, Serialize)]
struct CompatibleRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<i64>,
    stream: bool,
}

impl CompatibleProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(name: &str, base_url: &str, api_key: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(ToString::to_string),
            // No overall timeout: completions stream for as long as the model generates.
            client: Client::builder()
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn error(&self, request: &ChatRequest, message: impl Into<String>) -> ProviderError {
        ProviderError::new(self.name.clone(), request.model.clone(), message)
    }
}

#[async_trait]
impl Provider for CompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<ChatStream, ProviderError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            self.error(
                &request,
                format!("{} API key not set. Set the appropriate env var.", self.name),
            )
        })?;

        let body = CompatibleRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: true,
        };

        let url = format!("{}/v1/chat/completions", self.base_url);

        let req = self
            .client
            .post(&url)
            .header("Accept", "text/event-stream")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&body);

        tracing::debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            "Starting streaming completion"
        );

        let response = req
            .send()
            .await
            .map_err(|e| self.error(&request, format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(self
                .error(
                    &request,
                    format!("API error ({}): {}", status.as_u16(), error_text),
                )
                .with_status(status.as_u16()));
        }

        Ok(delta_stream(
            Box::pin(response.bytes_stream()),
            self.name.clone(),
            request.model,
        ))
    }
}
