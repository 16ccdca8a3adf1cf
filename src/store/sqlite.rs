//! SQLite-backed [`DocumentStore`].
//!
//! Embeddings are stored as little-endian `f32` BLOBs, metadata as JSON
//! text. Multi-table writes (completion, failure) run in one transaction.

use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::DocumentStore;
use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::{Error, Result};
use crate::models::{Document, DocumentChunk, DocumentStatus, Metadata};

const DOCUMENT_COLUMNS: &str = "id, filename, original_filename, file_type, file_size, file_path, \
     mime_type, content_hash, status, extracted_text, metadata_json, embedding, error_message, \
     created_at, updated_at";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn row_to_document(row: &SqliteRow) -> Result<Document> {
    let status: String = row.get("status");
    let status = status
        .parse::<DocumentStatus>()
        .map_err(|e| Error::Storage(sqlx::Error::Decode(e.into())))?;
    let metadata_json: String = row.get("metadata_json");
    let metadata: Metadata = serde_json::from_str(&metadata_json)?;
    let embedding: Option<Vec<u8>> = row.get("embedding");
    let file_path: String = row.get("file_path");

    Ok(Document {
        id: row.get("id"),
        filename: row.get("filename"),
        original_filename: row.get("original_filename"),
        file_type: row.get("file_type"),
        file_size: row.get("file_size"),
        file_path: PathBuf::from(file_path),
        mime_type: row.get("mime_type"),
        content_hash: row.get("content_hash"),
        status,
        extracted_text: row.get("extracted_text"),
        metadata,
        embedding: embedding.as_deref().map(blob_to_vec),
        error_message: row.get("error_message"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_chunk(row: &SqliteRow) -> DocumentChunk {
    let blob: Vec<u8> = row.get("embedding");
    DocumentChunk {
        id: row.get("id"),
        document_id: row.get("document_id"),
        chunk_index: row.get("chunk_index"),
        content: row.get("content"),
        embedding: blob_to_vec(&blob),
    }
}

async fn write_document<'e, E>(executor: E, doc: &Document) -> Result<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE documents
        SET status = ?, extracted_text = ?, metadata_json = ?, embedding = ?,
            error_message = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(doc.status.as_str())
    .bind(&doc.extracted_text)
    .bind(serde_json::to_string(&doc.metadata)?)
    .bind(doc.embedding.as_deref().map(vec_to_blob))
    .bind(&doc.error_message)
    .bind(doc.updated_at)
    .bind(&doc.id)
    .execute(executor)
    .await?;
    if result.rows_affected() == 0 {
        return Err(Error::NotFound(doc.id.clone()));
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn insert_document(&self, doc: &Document) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO documents ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            DOCUMENT_COLUMNS
        ))
        .bind(&doc.id)
        .bind(&doc.filename)
        .bind(&doc.original_filename)
        .bind(&doc.file_type)
        .bind(doc.file_size)
        .bind(doc.file_path.to_string_lossy().into_owned())
        .bind(&doc.mime_type)
        .bind(&doc.content_hash)
        .bind(doc.status.as_str())
        .bind(&doc.extracted_text)
        .bind(serde_json::to_string(&doc.metadata)?)
        .bind(doc.embedding.as_deref().map(vec_to_blob))
        .bind(&doc.error_message)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE id = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_document).transpose()
    }

    async fn list_documents(&self, skip: usize, limit: usize) -> Result<Vec<Document>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM documents ORDER BY created_at ASC, id ASC LIMIT ? OFFSET ?",
            DOCUMENT_COLUMNS
        ))
        .bind(limit as i64)
        .bind(skip as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_document).collect()
    }

    async fn update_document(&self, doc: &Document) -> Result<()> {
        write_document(&self.pool, doc).await
    }

    async fn complete_document(&self, doc: &Document, chunks: &[DocumentChunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        write_document(&mut *tx, doc).await?;

        sqlx::query("DELETE FROM document_chunks WHERE document_id = ?")
            .bind(&doc.id)
            .execute(&mut *tx)
            .await?;

        for chunk in chunks {
            sqlx::query(
                "INSERT INTO document_chunks (id, document_id, chunk_index, content, embedding) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.content)
            .bind(vec_to_blob(&chunk.embedding))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn mark_failed(&self, doc: &Document) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        write_document(&mut *tx, doc).await?;
        sqlx::query("DELETE FROM document_chunks WHERE document_id = ?")
            .bind(&doc.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_chunks(&self, document_id: &str) -> Result<Vec<DocumentChunk>> {
        let rows = sqlx::query(
            "SELECT id, document_id, chunk_index, content, embedding FROM document_chunks WHERE document_id = ? ORDER BY chunk_index ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_chunk).collect())
    }

    async fn delete_chunks(&self, document_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM document_chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_document(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn embedded_documents(&self) -> Result<Vec<Document>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE status = 'completed' AND embedding IS NOT NULL ORDER BY created_at ASC",
            DOCUMENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_document).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Completion, NewDocument};
    use crate::{db, migrate};

    async fn store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::connect(&dir.path().join("data/smartdoc.sqlite"))
            .await
            .unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        // second run must be a no-op
        migrate::run_migrations(&pool).await.unwrap();
        (dir, SqliteStore::new(pool))
    }

    fn doc() -> Document {
        Document::new(NewDocument {
            filename: "abc_report.txt".to_string(),
            original_filename: "report.txt".to_string(),
            file_type: "txt".to_string(),
            file_size: 42,
            file_path: PathBuf::from("/uploads/abc_report.txt"),
            mime_type: Some("text/plain".to_string()),
            content_hash: Some("00ff".to_string()),
        })
    }

    #[tokio::test]
    async fn document_round_trips() {
        let (_dir, store) = store().await;
        let mut d = doc();
        store.insert_document(&d).await.unwrap();

        d.begin_processing();
        store.update_document(&d).await.unwrap();
        let loaded = store.get_document(&d.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, DocumentStatus::Processing);
        assert_eq!(loaded.original_filename, "report.txt");
        assert_eq!(loaded.file_path, PathBuf::from("/uploads/abc_report.txt"));
        assert!(loaded.embedding.is_none());

        assert!(store.get_document("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn completion_writes_document_and_chunks() {
        let (_dir, store) = store().await;
        let mut d = doc();
        store.insert_document(&d).await.unwrap();

        let mut metadata = Metadata::new();
        metadata.insert("lines".to_string(), serde_json::json!(1));
        d.complete(Completion::Embedded {
            text: "hello world".to_string(),
            metadata,
            embedding: vec![0.5, -0.5],
        });
        let chunks = vec![DocumentChunk::new(&d.id, 0, "hello world".to_string(), vec![0.5, -0.5])];
        store.complete_document(&d, &chunks).await.unwrap();

        let loaded = store.get_document(&d.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, DocumentStatus::Completed);
        assert_eq!(loaded.embedding, Some(vec![0.5, -0.5]));
        assert_eq!(loaded.metadata["lines"], 1);
        let stored = store.list_chunks(&d.id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].embedding, vec![0.5, -0.5]);
        assert_eq!(store.embedded_documents().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failure_drops_old_chunks() {
        let (_dir, store) = store().await;
        let mut d = doc();
        store.insert_document(&d).await.unwrap();
        d.complete(Completion::Embedded {
            text: "x".to_string(),
            metadata: Metadata::new(),
            embedding: vec![1.0],
        });
        let chunks = vec![DocumentChunk::new(&d.id, 0, "x".to_string(), vec![1.0])];
        store.complete_document(&d, &chunks).await.unwrap();

        d.fail("extractor crashed");
        store.mark_failed(&d).await.unwrap();
        assert!(store.list_chunks(&d.id).await.unwrap().is_empty());
        let loaded = store.get_document(&d.id).await.unwrap().unwrap();
        assert_eq!(loaded.error_message.as_deref(), Some("extractor crashed"));
        assert!(loaded.extracted_text.is_none());
    }

    #[tokio::test]
    async fn deleting_document_cascades() {
        let (_dir, store) = store().await;
        let mut d = doc();
        store.insert_document(&d).await.unwrap();
        d.complete(Completion::Embedded {
            text: "abc".to_string(),
            metadata: Metadata::new(),
            embedding: vec![1.0],
        });
        let chunks: Vec<DocumentChunk> = (0..3)
            .map(|i| DocumentChunk::new(&d.id, i, format!("c{}", i), vec![1.0]))
            .collect();
        store.complete_document(&d, &chunks).await.unwrap();

        assert!(store.delete_document(&d.id).await.unwrap());
        assert!(store.list_chunks(&d.id).await.unwrap().is_empty());
        assert!(!store.delete_document(&d.id).await.unwrap());
    }

    #[tokio::test]
    async fn completing_a_deleted_document_writes_no_chunks() {
        let (_dir, store) = store().await;
        let mut d = doc();
        store.insert_document(&d).await.unwrap();
        assert!(store.delete_document(&d.id).await.unwrap());

        d.complete(Completion::Embedded {
            text: "abc".to_string(),
            metadata: Metadata::new(),
            embedding: vec![1.0],
        });
        let chunks = vec![DocumentChunk::new(&d.id, 0, "abc".to_string(), vec![1.0])];
        let err = store.complete_document(&d, &chunks).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(ref id) if *id == d.id));

        let (orphans,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM document_chunks")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(orphans, 0);
        assert!(matches!(
            store.update_document(&d).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn corrupt_metadata_is_reported() {
        let (_dir, store) = store().await;
        let d = doc();
        store.insert_document(&d).await.unwrap();
        sqlx::query("UPDATE documents SET metadata_json = 'not json' WHERE id = ?")
            .bind(&d.id)
            .execute(store.pool())
            .await
            .unwrap();

        assert!(matches!(store.get_document(&d.id).await, Err(Error::Json(_))));
        assert!(matches!(store.list_documents(0, 10).await, Err(Error::Json(_))));
    }

    #[tokio::test]
    async fn list_is_paginated_by_creation() {
        let (_dir, store) = store().await;
        let mut ids = Vec::new();
        for i in 0..3 {
            let mut d = doc();
            d.created_at += i;
            store.insert_document(&d).await.unwrap();
            ids.push(d.id);
        }
        let page = store.list_documents(1, 5).await.unwrap();
        assert_eq!(page.iter().map(|d| d.id.clone()).collect::<Vec<_>>(), ids[1..]);
    }
}
