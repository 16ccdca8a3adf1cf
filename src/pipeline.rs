//! Document pipeline orchestration.
//!
//! Owns every status transition of a [`Document`]:
//!
//! ```text
//! uploaded ──process──▶ processing ──┬──▶ completed
//!                                    └──▶ failed
//! ```
//!
//! `process` resolves an extractor by file type, extracts on the blocking
//! pool under a timeout, embeds the whole text, chunks it, embeds every
//! chunk, and persists the document together with its chunks in one
//! write. Any error after the `processing` transition is persisted as
//! `failed` with its message and then returned to the caller.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::chunk::ChunkWindow;
use crate::config::Config;
use crate::context::build_context;
use crate::embedding::{cosine_similarity, is_zero_vector, EmbeddingGenerator};
use crate::error::{Error, Result};
use crate::extract::{extension_of, ExtractorRegistry};
use crate::models::{Completion, Document, DocumentChunk, NewDocument};
use crate::store::DocumentStore;

/// Characters stripped from uploaded file names.
const DANGEROUS_PATTERNS: [&str; 7] = ["..", "~", "$", "&", "|", ";", "`"];

pub struct DocumentPipeline {
    store: Arc<dyn DocumentStore>,
    registry: Arc<ExtractorRegistry>,
    embedder: Arc<EmbeddingGenerator>,
    chunker: ChunkWindow,
    upload_dir: PathBuf,
    max_file_size: u64,
    extraction_timeout: Duration,
}

impl DocumentPipeline {
    /// Pipeline with default chunking, `./uploads`, a 100 MB upload limit
    /// and a 120 s extraction timeout.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        registry: Arc<ExtractorRegistry>,
        embedder: Arc<EmbeddingGenerator>,
    ) -> Self {
        Self {
            store,
            registry,
            embedder,
            chunker: ChunkWindow::default(),
            upload_dir: PathBuf::from("./uploads"),
            max_file_size: 100 * 1024 * 1024,
            extraction_timeout: Duration::from_secs(120),
        }
    }

    /// Wire every component from a loaded [`Config`].
    pub fn from_config(config: &Config, store: Arc<dyn DocumentStore>) -> Result<Self> {
        let registry = Arc::new(ExtractorRegistry::from_overrides(&config.extractors));
        let embedder = Arc::new(EmbeddingGenerator::from_config(&config.embedding)?);
        let chunker = ChunkWindow::new(config.chunking.window, config.chunking.overlap)?;

        Ok(Self::new(store, registry, embedder)
            .with_chunker(chunker)
            .with_upload_dir(config.storage.upload_dir.clone())
            .with_max_file_size(config.storage.max_file_size_bytes())
            .with_extraction_timeout(Duration::from_secs(
                config.processing.extraction_timeout_secs,
            )))
    }

    pub fn with_chunker(mut self, chunker: ChunkWindow) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn with_upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = dir.into();
        self
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn with_extraction_timeout(mut self, timeout: Duration) -> Self {
        self.extraction_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<ExtractorRegistry> {
        &self.registry
    }

    pub fn embedder(&self) -> &Arc<EmbeddingGenerator> {
        &self.embedder
    }

    /// Copy `source` into the upload directory and record it as `uploaded`.
    ///
    /// `original_filename` defaults to the source file's name. Nothing is
    /// extracted yet; call [`process`](Self::process) for that.
    pub async fn upload(
        &self,
        source: &Path,
        original_filename: Option<&str>,
        mime_type: Option<String>,
    ) -> Result<Document> {
        let original = match original_filename {
            Some(name) => name.to_string(),
            None => source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        let sanitized = sanitize_filename(&original);
        if sanitized.is_empty() {
            return Err(Error::Upload(format!("invalid file name: {:?}", original)));
        }

        let file_type = extension_of(Path::new(&sanitized));
        self.registry.resolve(&file_type)?;

        let size = tokio::fs::metadata(source).await?.len();
        if size > self.max_file_size {
            return Err(Error::Upload(format!(
                "file too large: {} bytes (maximum {} bytes)",
                size, self.max_file_size
            )));
        }
        let bytes = tokio::fs::read(source).await?;
        let content_hash = format!("{:x}", Sha256::digest(&bytes));

        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let filename = format!("{}_{}", Uuid::new_v4(), sanitized);
        let file_path = self.upload_dir.join(&filename);
        tokio::fs::write(&file_path, &bytes).await?;

        let doc = Document::new(NewDocument {
            filename,
            original_filename: original,
            file_type,
            file_size: bytes.len() as i64,
            file_path: file_path.clone(),
            mime_type,
            content_hash: Some(content_hash),
        });
        if let Err(e) = self.store.insert_document(&doc).await {
            let _ = tokio::fs::remove_file(&file_path).await;
            return Err(e);
        }

        tracing::info!(
            document_id = %doc.id,
            file_type = %doc.file_type,
            size = doc.file_size,
            status = %doc.status,
            "document uploaded"
        );
        Ok(doc)
    }

    /// Run extraction, chunking and embedding for one document.
    ///
    /// Returns the completed document. On failure the document is left
    /// `failed` with the error message and the error is returned.
    pub async fn process(&self, document_id: &str) -> Result<Document> {
        let mut doc = self
            .store
            .get_document(document_id)
            .await?
            .ok_or_else(|| Error::NotFound(document_id.to_string()))?;

        doc.begin_processing();
        self.store.update_document(&doc).await?;
        tracing::info!(document_id = %doc.id, status = %doc.status, "processing document");

        let err = match self.run(&doc).await {
            Ok((completion, chunks)) => {
                let mut done = doc.clone();
                done.complete(completion);
                match self.store.complete_document(&done, &chunks).await {
                    Ok(()) => {
                        tracing::info!(
                            document_id = %done.id,
                            status = %done.status,
                            chunks = chunks.len(),
                            "document processed"
                        );
                        return Ok(done);
                    }
                    Err(e) => e,
                }
            }
            Err(e) => e,
        };

        doc.fail(err.to_string());
        tracing::warn!(document_id = %doc.id, status = %doc.status, error = %err, "document processing failed");
        if let Err(persist) = self.store.mark_failed(&doc).await {
            tracing::error!(document_id = %doc.id, error = %persist, "could not record failure");
        }
        Err(err)
    }

    async fn run(&self, doc: &Document) -> Result<(Completion, Vec<DocumentChunk>)> {
        let extractor = self.registry.resolve(&doc.file_type)?;
        let extractor_name = extractor.name().to_string();
        tracing::info!(
            document_id = %doc.id,
            extractor = %extractor_name,
            extension = %doc.file_type,
            "resolved extractor"
        );

        let path = doc.file_path.clone();
        let task = tokio::task::spawn_blocking(move || extractor.extract(&path));
        let extracted = tokio::time::timeout(self.extraction_timeout, task)
            .await
            .map_err(|_| Error::Timeout {
                stage: "extraction",
                secs: self.extraction_timeout.as_secs(),
            })?
            .map_err(|e| Error::extraction(&extractor_name, format!("extractor task failed: {}", e)))??;

        if extracted.text.is_empty() {
            return Ok((
                Completion::Blank {
                    metadata: extracted.metadata,
                },
                Vec::new(),
            ));
        }

        let embedding = self.embedder.embed(&extracted.text).await?;

        let pieces = self.chunker.chunk(&extracted.text);
        let vectors = self.embedder.embed_batch(&pieces).await?;
        let chunks: Vec<DocumentChunk> = pieces
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (content, vector))| DocumentChunk::new(&doc.id, i as i64, content, vector))
            .collect();
        tracing::debug!(document_id = %doc.id, chunks = chunks.len(), "chunked and embedded");

        Ok((
            Completion::Embedded {
                text: extracted.text,
                metadata: extracted.metadata,
                embedding,
            },
            chunks,
        ))
    }

    /// Remove the backing file, the chunks, then the record.
    ///
    /// A backing file that is already gone is logged and skipped.
    pub async fn delete(&self, document_id: &str) -> Result<()> {
        let doc = self.get(document_id).await?;

        match tokio::fs::remove_file(&doc.file_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    document_id = %doc.id,
                    path = %doc.file_path.display(),
                    "backing file already removed"
                );
            }
            Err(e) => return Err(e.into()),
        }

        let removed = self.store.delete_chunks(&doc.id).await?;
        if !self.store.delete_document(&doc.id).await? {
            return Err(Error::NotFound(doc.id));
        }
        tracing::info!(document_id = %doc.id, chunks = removed, "document deleted");
        Ok(())
    }

    pub async fn get(&self, document_id: &str) -> Result<Document> {
        self.store
            .get_document(document_id)
            .await?
            .ok_or_else(|| Error::NotFound(document_id.to_string()))
    }

    pub async fn list(&self, skip: usize, limit: usize) -> Result<Vec<Document>> {
        self.store.list_documents(skip, limit).await
    }

    /// Chunks of an existing document, by index.
    pub async fn chunks(&self, document_id: &str) -> Result<Vec<DocumentChunk>> {
        let doc = self.get(document_id).await?;
        self.store.list_chunks(&doc.id).await
    }

    /// Completed documents ranked by cosine similarity to `query`.
    ///
    /// Documents with a zero or differently-sized embedding are skipped.
    /// A blank query matches nothing.
    pub async fn similar(&self, query: &str, limit: usize) -> Result<Vec<(Document, f32)>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = self.embedder.embed(query).await?;
        if is_zero_vector(&query_vec) {
            return Ok(Vec::new());
        }

        let mut scored = Vec::new();
        for doc in self.store.embedded_documents().await? {
            let score = match doc.embedding.as_deref() {
                Some(v) => match cosine_similarity(&query_vec, v) {
                    Ok(score) => score,
                    Err(Error::DegenerateVector) | Err(Error::DimensionMismatch { .. }) => continue,
                    Err(e) => return Err(e),
                },
                None => continue,
            };
            scored.push((doc, score));
        }

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(limit);
        Ok(scored)
    }

    /// Prompt context for the given documents; unknown ids are skipped.
    pub async fn context(&self, document_ids: &[String], max_chars: usize) -> Result<String> {
        let mut docs = Vec::with_capacity(document_ids.len());
        for id in document_ids {
            if let Some(doc) = self.store.get_document(id).await? {
                docs.push(doc);
            }
        }
        Ok(build_context(&docs, max_chars))
    }
}

/// Strip path components and shell-significant characters from a name.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let mut out = base.to_string();
    for pattern in DANGEROUS_PATTERNS {
        out = out.replace(pattern, "");
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_paths_and_metacharacters() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("a;b|c`d$e&f~g.txt"), "abcdefg.txt");
        assert_eq!(sanitize_filename("notes..txt"), "notestxt");
        assert_eq!(sanitize_filename("dir/"), "");
    }
}
