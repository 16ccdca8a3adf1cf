//! Storage abstraction for documents and their chunks.
//!
//! The [`DocumentStore`] trait is everything the pipeline needs from
//! persistence. Each method is one observable unit: a reader never sees
//! a document row updated without its chunk set, or the reverse.
//!
//! - [`SqliteStore`]: the production backend (sqlx, WAL mode)
//! - [`InMemoryStore`]: for tests and embedding in other processes

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Document, DocumentChunk};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a freshly uploaded document.
    async fn insert_document(&self, doc: &Document) -> Result<()>;

    async fn get_document(&self, id: &str) -> Result<Option<Document>>;

    /// Documents ordered by creation time, oldest first.
    async fn list_documents(&self, skip: usize, limit: usize) -> Result<Vec<Document>>;

    /// Persist the mutable fields of `doc` (status, text, metadata,
    /// embedding, error, `updated_at`) in a single write.
    async fn update_document(&self, doc: &Document) -> Result<()>;

    /// Persist a completed document and replace its chunk set atomically.
    async fn complete_document(&self, doc: &Document, chunks: &[DocumentChunk]) -> Result<()>;

    /// Persist a failed document and drop any chunks from earlier runs,
    /// atomically.
    async fn mark_failed(&self, doc: &Document) -> Result<()>;

    /// Chunks of a document ordered by `chunk_index`.
    async fn list_chunks(&self, document_id: &str) -> Result<Vec<DocumentChunk>>;

    /// Returns the number of chunks removed.
    async fn delete_chunks(&self, document_id: &str) -> Result<u64>;

    /// Returns `false` when no such document existed.
    async fn delete_document(&self, id: &str) -> Result<bool>;

    /// Completed documents that carry a document-level embedding.
    async fn embedded_documents(&self) -> Result<Vec<Document>>;
}
