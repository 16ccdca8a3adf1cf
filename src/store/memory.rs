//! In-memory [`DocumentStore`] for tests and single-process embedding.
//!
//! Documents live in a `HashMap` and chunks in a `Vec`, both behind one
//! `std::sync::RwLock` so multi-table writes are atomic to readers.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::DocumentStore;
use crate::error::{Error, Result};
use crate::models::{Document, DocumentChunk, DocumentStatus};

#[derive(Default)]
struct Tables {
    docs: HashMap<String, Document>,
    chunks: Vec<DocumentChunk>,
}

pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        match self.tables.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        match self.tables.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Total chunk rows across all documents.
    pub fn chunk_count(&self) -> usize {
        self.read().chunks.len()
    }
}

/// Overwrite a stored document, or fail when its row is gone.
fn replace(tables: &mut Tables, doc: &Document) -> Result<()> {
    match tables.docs.get_mut(&doc.id) {
        Some(stored) => {
            *stored = doc.clone();
            Ok(())
        }
        None => Err(Error::NotFound(doc.id.clone())),
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn insert_document(&self, doc: &Document) -> Result<()> {
        self.write().docs.insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.read().docs.get(id).cloned())
    }

    async fn list_documents(&self, skip: usize, limit: usize) -> Result<Vec<Document>> {
        let tables = self.read();
        let mut docs: Vec<&Document> = tables.docs.values().collect();
        docs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(docs.into_iter().skip(skip).take(limit).cloned().collect())
    }

    async fn update_document(&self, doc: &Document) -> Result<()> {
        replace(&mut self.write(), doc)
    }

    async fn complete_document(&self, doc: &Document, chunks: &[DocumentChunk]) -> Result<()> {
        let mut tables = self.write();
        replace(&mut tables, doc)?;
        tables.chunks.retain(|c| c.document_id != doc.id);
        tables.chunks.extend(chunks.iter().cloned());
        Ok(())
    }

    async fn mark_failed(&self, doc: &Document) -> Result<()> {
        let mut tables = self.write();
        replace(&mut tables, doc)?;
        tables.chunks.retain(|c| c.document_id != doc.id);
        Ok(())
    }

    async fn list_chunks(&self, document_id: &str) -> Result<Vec<DocumentChunk>> {
        let mut chunks: Vec<DocumentChunk> = self
            .read()
            .chunks
            .iter()
            .filter(|c| c.document_id == document_id)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }

    async fn delete_chunks(&self, document_id: &str) -> Result<u64> {
        let mut tables = self.write();
        let before = tables.chunks.len();
        tables.chunks.retain(|c| c.document_id != document_id);
        Ok((before - tables.chunks.len()) as u64)
    }

    async fn delete_document(&self, id: &str) -> Result<bool> {
        let mut tables = self.write();
        let removed = tables.docs.remove(id).is_some();
        if removed {
            tables.chunks.retain(|c| c.document_id != id);
        }
        Ok(removed)
    }

    async fn embedded_documents(&self) -> Result<Vec<Document>> {
        let tables = self.read();
        let mut docs: Vec<Document> = tables
            .docs
            .values()
            .filter(|d| d.status == DocumentStatus::Completed && d.embedding.is_some())
            .cloned()
            .collect();
        docs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Completion, Metadata, NewDocument};
    use std::path::PathBuf;

    fn doc(name: &str) -> Document {
        Document::new(NewDocument {
            filename: format!("x_{}", name),
            original_filename: name.to_string(),
            file_type: "txt".to_string(),
            file_size: 1,
            file_path: PathBuf::from(name),
            mime_type: None,
            content_hash: None,
        })
    }

    #[tokio::test]
    async fn complete_replaces_chunks_and_failure_clears_them() {
        let store = InMemoryStore::new();
        let mut d = doc("a.txt");
        store.insert_document(&d).await.unwrap();

        d.complete(Completion::Embedded {
            text: "abc".into(),
            metadata: Metadata::new(),
            embedding: vec![1.0],
        });
        let chunks = vec![
            DocumentChunk::new(&d.id, 1, "b".into(), vec![1.0]),
            DocumentChunk::new(&d.id, 0, "a".into(), vec![1.0]),
        ];
        store.complete_document(&d, &chunks).await.unwrap();
        let listed = store.list_chunks(&d.id).await.unwrap();
        assert_eq!(listed.iter().map(|c| c.chunk_index).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(store.embedded_documents().await.unwrap().len(), 1);

        d.fail("boom");
        store.mark_failed(&d).await.unwrap();
        assert!(store.list_chunks(&d.id).await.unwrap().is_empty());
        let stored = store.get_document(&d.id).await.unwrap().unwrap();
        assert_eq!(stored.status, DocumentStatus::Failed);
        assert!(store.embedded_documents().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn writes_to_deleted_document_are_rejected() {
        let store = InMemoryStore::new();
        let mut d = doc("a.txt");
        store.insert_document(&d).await.unwrap();
        assert!(store.delete_document(&d.id).await.unwrap());

        d.complete(Completion::Embedded {
            text: "abc".into(),
            metadata: Metadata::new(),
            embedding: vec![1.0],
        });
        let chunks = vec![DocumentChunk::new(&d.id, 0, "abc".into(), vec![1.0])];
        let err = store.complete_document(&d, &chunks).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(ref id) if *id == d.id));
        assert_eq!(store.chunk_count(), 0);

        assert!(matches!(
            store.update_document(&d).await,
            Err(Error::NotFound(_))
        ));
        d.fail("boom");
        assert!(matches!(store.mark_failed(&d).await, Err(Error::NotFound(_))));
        assert!(store.get_document(&d.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_reports_missing_documents() {
        let store = InMemoryStore::new();
        let d = doc("a.txt");
        store.insert_document(&d).await.unwrap();
        assert!(store.delete_document(&d.id).await.unwrap());
        assert!(!store.delete_document(&d.id).await.unwrap());
    }
}
