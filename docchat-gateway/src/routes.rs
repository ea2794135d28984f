//! Route definitions for the docchat gateway.
//!
//! Provides HTTP endpoints for PDF upload, streaming chat, history, reset, and
//! liveness checks.

use crate::document::{self, UploadResponse};
use crate::provider::Provider;
use crate::relay::{ChatRelay, RelaySettings};
use crate::session::{default_session_id, ChatMessage, SessionStore};
use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, DefaultBodyLimit, Multipart,
        Path, Query, State,
    },
    http::{header, HeaderValue},
    response::{
        sse::{Event, Sse},
        IntoResponse, Json,
    },
    routing::{get, post},
    Router,
};
use docchat_common::{Config, Error, Result};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tower::ServiceBuilder;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub relay: Arc<ChatRelay>,
}

impl AppState {
    pub fn new(provider: Arc<dyn Provider>, settings: RelaySettings) -> Self {
        Self {
            sessions: Arc::new(SessionStore::new()),
            relay: Arc::new(ChatRelay::new(provider, settings)),
        }
    }
}

/// Liveness response.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
    pub version: String,
    /// Number of live sessions
    pub sessions: usize,
}

/// Chat request body.
#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub message: String,
    #[serde(default = "default_session_id")]
    pub session_id: String,
}

/// Reset request body.
#[derive(Debug, Deserialize)]
pub struct ResetBody {
    #[serde(default = "default_session_id")]
    pub session_id: String,
}

/// Reset response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResetResponse {
    pub message: String,
    pub session_id: String,
}

/// Conversation history response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub history: Vec<ChatMessage>,
    pub has_pdf: bool,
}

/// Query parameters accepted by the upload endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    pub session_id: Option<String>,
}

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState, config: &Config) -> Result<Router> {
    let cors = cors_layer(&config.cors.allowed_origin)?;

    let router = Router::new()
        .route("/", get(status_handler))
        .route("/health", get(status_handler))
        .route(
            "/api/upload-pdf",
            post(upload_pdf_handler)
                .layer(DefaultBodyLimit::max(config.document.max_upload_bytes)),
        )
        .route("/api/chat", post(chat_handler))
        .route("/api/history/:session_id", get(history_handler))
        .route("/api/reset", post(reset_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state);

    Ok(router)
}

/// CORS for a single browser origin, with credentials.
///
/// Requests from any other origin get no `Access-Control-Allow-Origin` header.
fn cors_layer(origin: &str) -> Result<CorsLayer> {
    let origin_value = HeaderValue::from_str(origin)
        .map_err(|e| Error::Config(format!("Invalid allowed origin {:?}: {}", origin, e)))?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list([origin_value]))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".into(),
        message: "docchat API is running".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        sessions: state.sessions.len().await,
    })
}

/// Accept a PDF and store its text as the session's document context.
///
/// The session id is taken from the multipart `session_id` field, then the
/// `session_id` query parameter, then the default.
async fn upload_pdf_handler(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>> {
    let mut multipart =
        multipart.map_err(|e| Error::InvalidInput(format!("Invalid upload: {}", e.body_text())))?;

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut form_session_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidInput(format!("Invalid upload: {}", e.body_text())))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| Error::InvalidInput(format!("Invalid upload: {}", e.body_text())))?;
                file = Some((filename, bytes.to_vec()));
            }
            Some("session_id") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| Error::InvalidInput(format!("Invalid upload: {}", e.body_text())))?;
                form_session_id = Some(value);
            }
            _ => {}
        }
    }

    let (filename, bytes) = file.ok_or_else(|| Error::InvalidInput("No file uploaded".into()))?;
    let session_id = form_session_id
        .or(query.session_id)
        .filter(|id| !id.is_empty())
        .unwrap_or_else(default_session_id);

    tracing::info!(session_id = %session_id, filename = %filename, bytes = bytes.len(), "PDF upload");

    let receipt = document::ingest(&state.sessions, &session_id, &filename, bytes).await?;
    Ok(Json(receipt))
}

/// Stream a chat turn as server-sent events.
async fn chat_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ChatBody>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(body) = payload.map_err(|e| Error::InvalidInput(e.body_text()))?;

    tracing::info!(
        session_id = %body.session_id,
        message_chars = body.message.chars().count(),
        "Chat request"
    );

    let session = state.sessions.get_or_create(&body.session_id).await;
    let events = state.relay.start_turn(session, body.message).await;
    let stream = ReceiverStream::new(events).map(|event| Event::default().json_data(event));

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Sse::new(stream),
    ))
}

/// Return a session's history. Unknown ids are registered as empty sessions.
async fn history_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Json<HistoryResponse> {
    let snapshot = state.sessions.get_or_create(&session_id).await.snapshot().await;

    Json(HistoryResponse {
        session_id,
        history: snapshot.history,
        has_pdf: snapshot.has_document,
    })
}

async fn reset_handler(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ResetBody>, JsonRejection>,
) -> Result<Json<ResetResponse>> {
    let Json(body) = payload.map_err(|e| Error::InvalidInput(e.body_text()))?;

    let existed = state.sessions.reset(&body.session_id).await;
    tracing::info!(session_id = %body.session_id, existed, "Chat session reset");

    Ok(Json(ResetResponse {
        message: "Chat session reset successfully".into(),
        session_id: body.session_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_body_defaults_session_id() {
        let body: ChatBody = serde_json::from_str(r#"{"message": "Hi"}"#).unwrap();
        assert_eq!(body.session_id, "default");
        assert_eq!(body.message, "Hi");
    }

    #[test]
    fn reset_body_accepts_empty_object() {
        let body: ResetBody = serde_json::from_str("{}").unwrap();
        assert_eq!(body.session_id, "default");
    }

    #[test]
    fn chat_body_requires_message() {
        assert!(serde_json::from_str::<ChatBody>(r#"{"session_id": "s1"}"#).is_err());
    }

    #[test]
    fn rejects_invalid_origin() {
        let err = cors_layer("http://bad\norigin").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
