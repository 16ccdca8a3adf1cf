//! Embedding backends and the generator the pipeline talks to.
//!
//! An [`EmbeddingBackend`] turns non-empty texts into vectors. Backends:
//! - **`local`** ([`LocalBackend`]): fastembed/ONNX inference in-process; the
//!   model is loaded once per process on first use.
//! - **`ollama`** ([`OllamaBackend`]): `POST /api/embed` on a running Ollama, with
//!   retry and backoff.
//! - **`hash`** ([`HashEmbedder`]): deterministic feature hashing, no model. Used
//!   for tests and offline smoke runs.
//!
//! [`EmbeddingGenerator`] wraps a backend and enforces the contract the
//! pipeline relies on: blank text maps to the zero vector, every vector
//! has the configured dimension, batch output equals element-wise output,
//! and every backend call is bounded by a timeout.
//!
//! Also provides vector utilities:
//! - [`cosine_similarity`]: similarity with explicit zero-vector rejection
//! - [`vec_to_blob`] / [`blob_to_vec`]: little-endian `f32` BLOB encoding for SQLite

mod hash;
#[cfg(feature = "local-embeddings")]
mod local;
mod ollama;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

pub use hash::HashEmbedder;
#[cfg(feature = "local-embeddings")]
pub use local::LocalBackend;
pub use ollama::OllamaBackend;

/// Default dimension for the `hash` backend.
pub const DEFAULT_DIMS: usize = 384;

/// Model used by the `local` provider when none is configured.
pub const DEFAULT_LOCAL_MODEL: &str = "all-minilm-l6-v2";

/// Output width of a model the `local` provider can load, `None` if the
/// name is not one of them.
pub fn local_model_dims(model: &str) -> Option<usize> {
    match model {
        "all-minilm-l6-v2" | "bge-small-en-v1.5" | "multilingual-e5-small" => Some(384),
        "bge-base-en-v1.5" | "nomic-embed-text-v1" | "nomic-embed-text-v1.5" => Some(768),
        "multilingual-e5-base" => Some(768),
        "bge-large-en-v1.5" | "multilingual-e5-large" => Some(1024),
        _ => None,
    }
}

/// A source of embedding vectors.
///
/// Implementations receive only non-blank texts and must return exactly
/// one vector per input, in input order.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;

    fn dims(&self) -> usize;

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Build the backend named by `config.provider`.
pub fn create_backend(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingBackend>> {
    match config.provider.as_str() {
        "hash" => Ok(Arc::new(HashEmbedder::new(
            config.dims.unwrap_or(DEFAULT_DIMS),
        ))),
        "ollama" => Ok(Arc::new(OllamaBackend::new(config)?)),
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Arc::new(LocalBackend::new(config)?)),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => Err(Error::Config(
            "local embedding provider requires --features local-embeddings".to_string(),
        )),
        other => Err(Error::Config(format!(
            "unknown embedding provider: {}",
            other
        ))),
    }
}

/// Dimension-checked, timeout-bounded front end over a backend.
pub struct EmbeddingGenerator {
    backend: Arc<dyn EmbeddingBackend>,
    timeout: Duration,
    batch_size: usize,
}

impl EmbeddingGenerator {
    pub fn new(backend: Arc<dyn EmbeddingBackend>, timeout: Duration, batch_size: usize) -> Self {
        Self {
            backend,
            timeout,
            batch_size: batch_size.max(1),
        }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self::new(
            create_backend(config)?,
            Duration::from_secs(config.timeout_secs),
            config.batch_size,
        ))
    }

    /// The process-wide vector dimension `D`.
    pub fn dims(&self) -> usize {
        self.backend.dims()
    }

    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    pub fn zero_vector(&self) -> Vec<f32> {
        vec![0.0; self.dims()]
    }

    /// Embed one text. Blank text yields the zero vector.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut out = self.embed_batch(&[text.to_string()]).await?;
        out.pop()
            .ok_or_else(|| Error::embedding("backend returned no vector"))
    }

    /// Embed many texts, preserving order.
    ///
    /// Blank entries are filled with zero vectors without reaching the
    /// backend; the rest are sent in `batch_size` groups.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let dims = self.dims();
        let mut out: Vec<Option<Vec<f32>>> = vec![None; texts.len()];

        let pending: Vec<usize> = texts
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.trim().is_empty())
            .map(|(i, _)| i)
            .collect();

        for group in pending.chunks(self.batch_size) {
            let batch: Vec<String> = group.iter().map(|&i| texts[i].clone()).collect();
            let vectors = tokio::time::timeout(self.timeout, self.backend.embed_texts(&batch))
                .await
                .map_err(|_| Error::Timeout {
                    stage: "embedding",
                    secs: self.timeout.as_secs(),
                })??;

            if vectors.len() != batch.len() {
                return Err(Error::embedding(format!(
                    "backend returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                )));
            }
            for (&i, vector) in group.iter().zip(vectors) {
                if vector.len() != dims {
                    return Err(Error::DimensionMismatch {
                        expected: dims,
                        actual: vector.len(),
                    });
                }
                out[i] = Some(vector);
            }
            tracing::debug!(count = batch.len(), "embedded batch");
        }

        Ok(out
            .into_iter()
            .map(|v| v.unwrap_or_else(|| vec![0.0; dims]))
            .collect())
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB produced by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
///
/// Fails with [`Error::DimensionMismatch`] for vectors of different
/// lengths and [`Error::DegenerateVector`] when either norm is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(Error::DegenerateVector);
    }

    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0))
}

pub fn is_zero_vector(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}
