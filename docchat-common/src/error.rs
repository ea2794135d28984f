//! Error types for docchat.

use thiserror::Error;

/// Result type alias using the docchat error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for docchat services.
///
/// Messages are free text meant for direct display to the end user.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input or request
    #[error("{0}")]
    InvalidInput(String),

    /// Uploaded file is not a PDF
    #[error("Only PDF files are allowed")]
    UnsupportedFormat,

    /// PDF parsed but carried no text layer
    #[error("No text found in PDF")]
    EmptyDocument,

    /// Completion provider failure
    #[error("Error generating response: {0}")]
    Upstream(String),

    /// Internal error
    #[error("{0}")]
    Internal(String),
}

impl Error {
    /// Check if this error was caused by the client.
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput(_) | Self::UnsupportedFormat | Self::EmptyDocument
        )
    }

    /// Get HTTP status code for this error.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) | Self::UnsupportedFormat | Self::EmptyDocument => 400,
            Self::Upstream(_) => 502,
            _ => 500,
        }
    }
}

/// Error body returned by every HTTP endpoint.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = axum::http::StatusCode::from_u16(self.status_code())
            .unwrap_or(axum::http::StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        (
            status,
            axum::Json(ErrorResponse {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}
