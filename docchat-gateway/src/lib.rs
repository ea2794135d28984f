//! Docchat Gateway - Chat over an uploaded PDF, streamed from an LLM.
//!
//! This crate provides the HTTP service behind the docchat frontend:
//! - In-memory chat sessions with conversation history
//! - PDF upload, whose text becomes the session's document context
//! - Streaming chat relay to an OpenAI-compatible provider (Groq)
//! - Server-sent event delivery of completion fragments
//!
//! ## Architecture
//!
//! ```text
//! Client → /api/chat → relay (history + context) → Provider
//!                ↑                                     │
//!                └──── data: {"chunk"} … {"done"} ─────┘
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod document;
pub mod provider;
pub mod relay;
pub mod routes;
pub mod session;

pub use provider::{ChatRequest, ChatStream, CompatibleProvider, Message, Provider, ProviderError};
pub use relay::{ChatRelay, RelayEvent, RelaySettings};
pub use routes::{build_router, AppState};
pub use session::{ChatMessage, Role, SessionHandle, SessionStore};

use axum::Router;
use docchat_common::config::Config;
use std::sync::Arc;

/// Build the gateway router around an explicit provider.
pub fn build_app(config: &Config, provider: Arc<dyn Provider>) -> docchat_common::Result<Router> {
    let state = AppState::new(provider, RelaySettings::from(config));
    build_router(state, config)
}

/// Start the gateway server.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let api_key = config.groq_api_key()?;
    let provider: Arc<dyn Provider> = Arc::new(CompatibleProvider::new(
        "groq",
        &config.llm.base_url,
        Some(api_key),
    ));

    let addr = config.listen_address()?;

    let router = build_app(config, provider)?;

    tracing::info!(model = %config.llm.model, "Starting docchat gateway on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
