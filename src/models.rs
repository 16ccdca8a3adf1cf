//! Core data models used throughout smartdoc.
//!
//! These types represent the documents, chunks, and extraction results that
//! flow through the upload → extract → chunk → embed → persist pipeline.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

/// Open-ended, format-specific metadata map.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Lifecycle state of a [`Document`].
///
/// `Uploaded → Processing → Completed | Failed`. Terminal states are left
/// only by an explicit new call to `process`, which starts again from
/// `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Uploaded,
    Processing,
    Completed,
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Uploaded => "uploaded",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Failed)
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(DocumentStatus::Uploaded),
            "processing" => Ok(DocumentStatus::Processing),
            "completed" => Ok(DocumentStatus::Completed),
            "failed" => Ok(DocumentStatus::Failed),
            other => Err(format!("unknown document status: {}", other)),
        }
    }
}

/// Fields supplied by the upload layer when a document record is created.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub filename: String,
    pub original_filename: String,
    /// Lowercase extension without the leading dot.
    pub file_type: String,
    pub file_size: i64,
    pub file_path: PathBuf,
    pub mime_type: Option<String>,
    pub content_hash: Option<String>,
}

/// An uploaded file and everything extracted from it.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub original_filename: String,
    pub file_type: String,
    pub file_size: i64,
    pub file_path: PathBuf,
    pub mime_type: Option<String>,
    /// SHA-256 of the uploaded bytes.
    pub content_hash: Option<String>,
    pub status: DocumentStatus,
    pub extracted_text: Option<String>,
    pub metadata: Metadata,
    #[serde(skip_serializing)]
    pub embedding: Option<Vec<f32>>,
    pub error_message: Option<String>,
    /// Unix milliseconds.
    pub created_at: i64,
    pub updated_at: i64,
}

impl Document {
    /// Create a fresh record in the `uploaded` state.
    pub fn new(new: NewDocument) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id: Uuid::new_v4().to_string(),
            filename: new.filename,
            original_filename: new.original_filename,
            file_type: new.file_type,
            file_size: new.file_size,
            file_path: new.file_path,
            mime_type: new.mime_type,
            content_hash: new.content_hash,
            status: DocumentStatus::Uploaded,
            extracted_text: None,
            metadata: Metadata::new(),
            embedding: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn begin_processing(&mut self) {
        self.status = DocumentStatus::Processing;
        self.error_message = None;
        self.touch();
    }

    /// Apply a successful pipeline run.
    pub fn complete(&mut self, completion: Completion) {
        match completion {
            Completion::Embedded {
                text,
                metadata,
                embedding,
            } => {
                self.extracted_text = Some(text);
                self.metadata = metadata;
                self.embedding = Some(embedding);
            }
            Completion::Blank { metadata } => {
                self.extracted_text = Some(String::new());
                self.metadata = metadata;
                self.embedding = None;
            }
        }
        self.status = DocumentStatus::Completed;
        self.error_message = None;
        self.touch();
    }

    /// Record a failure. Content from earlier runs is dropped with it.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = DocumentStatus::Failed;
        self.error_message = Some(message.into());
        self.extracted_text = None;
        self.embedding = None;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now().timestamp_millis();
    }
}

/// Outcome of a successful run, consumed by [`Document::complete`].
///
/// Non-empty text always travels with its embedding, so a completed
/// document with text but no embedding cannot be built.
#[derive(Debug, Clone)]
pub enum Completion {
    Embedded {
        text: String,
        metadata: Metadata,
        embedding: Vec<f32>,
    },
    /// Extraction succeeded but produced no text.
    Blank { metadata: Metadata },
}

/// A window of a document's extracted text with its own embedding.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentChunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub content: String,
    #[serde(skip_serializing)]
    pub embedding: Vec<f32>,
}

impl DocumentChunk {
    pub fn new(document_id: &str, chunk_index: i64, content: String, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            chunk_index,
            content,
            embedding,
        }
    }
}

/// Text and metadata returned by every extractor. Not persisted directly.
#[derive(Debug, Clone, Default)]
pub struct ExtractionResult {
    pub text: String,
    pub metadata: Metadata,
}

impl ExtractionResult {
    pub fn new(text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }
}
