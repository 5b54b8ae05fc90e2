//! Error types for the edgequake-pdf2quiz library.
//!
//! Two distinct error types reflect two distinct failure domains:
//!
//! * [`QuizError`], **pipeline**: quiz generation for one document cannot
//!   proceed (unreachable URL, not a PDF, provider not configured). Every
//!   `QuizError` is caught once at the orchestrator boundary and turned into an
//!   [`crate::output::ErrorEnvelope`], so callers of
//!   [`crate::generate::QuizGenerator::generate`] never see it raw.
//!
//! * [`StoreError`], **persistence**: the quiz was generated but could not be
//!   written. Raised by [`crate::store::QuizStore`] implementations and
//!   surfaced per document by the batch runner.

use std::path::PathBuf;
use thiserror::Error;

/// Broad failure class of a [`QuizError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Remote PDF unreachable or non-2xx.
    Fetch,
    /// Local file missing, unreadable, or the input is not a path/URL.
    Io,
    /// Bytes are not a parseable PDF, or the PDF engine is unavailable.
    Extraction,
    /// Model call failed (quota, network, missing credentials).
    Model,
    /// The reply produced no question records.
    MalformedResponse,
    /// Invalid configuration.
    Config,
    /// Anything else.
    Internal,
}

/// All fatal errors raised inside the quiz-generation pipeline.
#[derive(Debug, Error)]
pub enum QuizError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is neither a usable file path nor an HTTP/HTTPS URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP request failed or returned a non-success status.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The response body is larger than the configured download cap.
    #[error("PDF at '{url}' exceeds the {limit}-byte download limit\nRaise --max-download-bytes.")]
    DownloadTooLarge { url: String, limit: u64 },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// The source was read, but does not start with the `%PDF` header.
    #[error("Source is not a valid PDF: '{source_name}'\nFirst bytes: {magic:?}")]
    NotAPdf { source_name: String, magic: Vec<u8> },

    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{source_name}' could not be parsed: {detail}")]
    CorruptPdf { source_name: String, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The model call failed after all retries.
    #[error("LLM call failed after {retries} retries: {message}")]
    ModelFailed { retries: u32, message: String },

    /// The reply could not be interpreted into any question record.
    ///
    /// Never raised by the pipeline itself; see
    /// [`crate::output::QuizDocument::into_result`].
    #[error("Model reply for '{source_name}' contained no questions")]
    MalformedResponse { source_name: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QuizError {
    /// The failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            QuizError::DownloadFailed { .. }
            | QuizError::DownloadTimeout { .. }
            | QuizError::DownloadTooLarge { .. } => ErrorKind::Fetch,
            QuizError::FileNotFound { .. }
            | QuizError::PermissionDenied { .. }
            | QuizError::InvalidInput { .. } => ErrorKind::Io,
            QuizError::NotAPdf { .. }
            | QuizError::CorruptPdf { .. }
            | QuizError::PdfiumBindingFailed(_) => ErrorKind::Extraction,
            QuizError::ProviderNotConfigured { .. } | QuizError::ModelFailed { .. } => {
                ErrorKind::Model
            }
            QuizError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            QuizError::InvalidConfig(_) => ErrorKind::Config,
            QuizError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Errors raised by [`crate::store::QuizStore`] implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A quiz with this id already exists; ids must be unique.
    #[error("Quiz '{quiz_id}' already exists in the store")]
    DuplicateQuizId { quiz_id: String },

    /// Reading or writing the backing medium failed.
    #[error("Store I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The record could not be (de)serialised.
    #[error("Failed to serialise quiz record: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The backend is temporarily refusing writes (throttling, lock contention).
    #[error("Store temporarily unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether retrying the same write may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Unavailable(_) => true,
            StoreError::Io { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
            ),
            StoreError::DuplicateQuizId { .. } | StoreError::Serialize(_) => false,
        }
    }
}
