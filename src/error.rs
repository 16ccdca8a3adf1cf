//! Error types for the ingestion pipeline.
//!
//! Every failure inside [`DocumentPipeline::process`](crate::pipeline::DocumentPipeline::process)
//! is converted once into a persisted `failed` status and then returned as
//! one of these variants, so callers can decide whether to alert a user.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline errors.
#[derive(Debug, Error)]
pub enum Error {
    /// No registered extractor claims the file extension.
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    /// An extractor could not read or parse the file.
    #[error("{extractor} extraction failed: {message}")]
    Extraction { extractor: String, message: String },

    /// Cosine similarity was requested on a zero vector.
    #[error("cannot compute similarity with a zero vector")]
    DegenerateVector,

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("embedding generation failed: {0}")]
    Embedding(String),

    /// A bounded stage (extraction, embedding) exceeded its time limit.
    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: &'static str, secs: u64 },

    #[error("configuration error: {0}")]
    Config(String),

    /// Upload rejected before a document record was created.
    #[error("upload rejected: {0}")]
    Upload(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn extraction(extractor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            extractor: extractor.into(),
            message: message.into(),
        }
    }

    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Whether retrying the same operation could succeed without a new upload.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Embedding(_) | Error::Timeout { .. } | Error::Storage(_) | Error::Io(_)
        )
    }
}

/// Failure reported by a single extractor.
///
/// Wraps the underlying cause as text so the message survives into the
/// document's persisted `error_message`.
#[derive(Debug, Clone, Error)]
#[error("{extractor} extraction failed: {message}")]
pub struct ExtractionFailure {
    pub extractor: String,
    pub message: String,
}

impl ExtractionFailure {
    pub fn new(extractor: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            extractor: extractor.into(),
            message: message.into(),
        }
    }
}

impl From<ExtractionFailure> for Error {
    fn from(failure: ExtractionFailure) -> Self {
        Error::Extraction {
            extractor: failure.extractor,
            message: failure.message,
        }
    }
}
