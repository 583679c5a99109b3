//! Error types for the ocr2md library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`Ocr2MdError`] — **Fatal**: the session cannot proceed at all
//!   (unsupported upload, rasteriser missing, malformed PDF, bad config).
//!   Returned as `Err(Ocr2MdError)` from [`crate::session::Session::process`].
//!
//! * [`OcrRequestError`] — a single call to the hosted vision model failed.
//!   Returned by [`crate::pipeline::ocr::VisionOcrService::extract`].
//!
//! * [`PageError`] — **Non-fatal**: the page-level record of an
//!   `OcrRequestError`. Stored inside [`crate::output::PageResult`]; the page
//!   contributes nothing to the document and the session moves on.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the ocr2md library.
#[derive(Debug, Error)]
pub enum Ocr2MdError {
    // ── Upload errors ─────────────────────────────────────────────────────
    /// Upload path does not exist.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Upload is not one of JPG, PNG or PDF.
    #[error("Unsupported file '{filename}': expected an image (JPG/PNG) or PDF, got '{mime}'")]
    UnsupportedFileType { filename: String, mime: String },

    /// Upload contained zero bytes.
    #[error("Uploaded file '{filename}' is empty")]
    EmptyUpload { filename: String },

    // ── Rasterisation errors ──────────────────────────────────────────────
    /// The external PDF rasteriser is not installed or cannot be started.
    #[error("{message}")]
    ToolUnavailable { message: String },

    /// The rasteriser rejected the PDF or produced no pages.
    #[error("Error converting PDF: {detail}")]
    ConversionError { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Model identifier is not in the catalog.
    #[error("Unknown model '{model}'. Available: {available}")]
    UnknownModel { model: String, available: String },

    /// No credential for the hosted model.
    #[error("No API key configured.\nSet GROQ_API_KEY in the environment or pass --api-key.")]
    MissingApiKey,

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not write the Markdown output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<poppler_locate::PopplerError> for Ocr2MdError {
    fn from(e: poppler_locate::PopplerError) -> Self {
        Ocr2MdError::ToolUnavailable {
            message: e.to_string(),
        }
    }
}

/// A failed request to the hosted vision model.
///
/// None of these are retried: the page is skipped and reported.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OcrRequestError {
    /// Connection, TLS or protocol failure before a response arrived.
    #[error("request failed: {0}")]
    Transport(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// HTTP 401/403: the API key was rejected.
    #[error("authentication failed (HTTP {status}): {detail}")]
    Auth { status: u16, detail: String },

    /// HTTP 429.
    #[error("rate limit exceeded{}", retry_suffix(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    /// Any other non-success HTTP status.
    #[error("API error (HTTP {status}): {detail}")]
    Api { status: u16, detail: String },

    /// 2xx response whose body is not a chat completion.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

fn retry_suffix(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(s) => format!(" (retry after {s}s)"),
        None => String::new(),
    }
}

/// A non-fatal error for a single page.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The OCR request for this page failed.
    #[error("Page {page}: error processing image: {detail}")]
    OcrFailed { page: usize, detail: String },
}

impl PageError {
    pub fn from_request(page: usize, err: &OcrRequestError) -> Self {
        PageError::OcrFailed {
            page,
            detail: err.to_string(),
        }
    }
}
