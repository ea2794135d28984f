//! PDF ingestion.
//!
//! An upload is accepted only when the filename carries a `.pdf` extension.
//! Page texts are joined in page order, each followed by a newline, and the
//! whole result is trimmed. The extracted text becomes the session's document
//! context, replacing any earlier one.

use crate::session::SessionStore;
use docchat_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Body returned after a successful upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
    pub text_length: usize,
    pub session_id: String,
}

/// Reject anything that does not look like a PDF by name.
///
/// The extension is matched case-insensitively, so `REPORT.PDF` passes. A name
/// that is only an extension, such as `.pdf`, has no stem and is rejected.
pub fn ensure_pdf_filename(filename: &str) -> Result<()> {
    let is_pdf = filename
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && ext.eq_ignore_ascii_case("pdf"));

    if is_pdf {
        Ok(())
    } else {
        Err(Error::UnsupportedFormat)
    }
}

/// Concatenate page texts in order.
pub fn join_pages<I, S>(pages: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut text = String::new();
    for page in pages {
        text.push_str(page.as_ref());
        text.push('\n');
    }
    text.trim().to_string()
}

/// Extract the text layer of a PDF held in memory.
///
/// Parsing is CPU-bound and synchronous, so it runs on the blocking pool.
pub async fn extract_text(bytes: Vec<u8>) -> Result<String> {
    let pages = tokio::task::spawn_blocking(move || {
        pdf_extract::extract_text_from_mem_by_pages(&bytes)
    })
    .await
    .map_err(|e| Error::Internal(format!("Error uploading PDF: {}", e)))?
    .map_err(|e| Error::InvalidInput(format!("Error processing PDF: {}", e)))?;

    Ok(join_pages(pages))
}

/// Store the text of an uploaded PDF as the session's document context.
///
/// Nothing is created or mutated unless every check passes.
pub async fn ingest(
    store: &SessionStore,
    session_id: &str,
    filename: &str,
    bytes: Vec<u8>,
) -> Result<UploadResponse> {
    ensure_pdf_filename(filename)?;

    let size = bytes.len();
    let text = extract_text(bytes).await?;
    if text.is_empty() {
        return Err(Error::EmptyDocument);
    }

    let text_length = text.chars().count();
    let session = store.get_or_create(session_id).await;
    session.write().await.set_document_context(text);

    tracing::info!(
        session_id = %session_id,
        filename = %filename,
        bytes = size,
        text_length,
        "Document context stored"
    );

    Ok(UploadResponse {
        message: "PDF uploaded successfully".into(),
        filename: filename.to_string(),
        text_length,
        session_id: session_id.to_string(),
    })
}
