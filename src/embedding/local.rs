//! Local inference through fastembed (bundled ONNX runtime).
//!
//! Models are downloaded from Hugging Face on first use and cached. The
//! loaded model lives in a process-wide [`OnceCell`]; concurrent first
//! calls wait on the same initialization instead of loading twice. A
//! process serves one local model: asking for a different one after the
//! first load is a configuration error.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tokio::sync::OnceCell;

use super::{local_model_dims, EmbeddingBackend, DEFAULT_LOCAL_MODEL};
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

struct LoadedModel {
    name: String,
    engine: Mutex<TextEmbedding>,
}

static MODEL: OnceCell<Arc<LoadedModel>> = OnceCell::const_new();

pub struct LocalBackend {
    model_name: String,
    dims: usize,
    cache_dir: Option<PathBuf>,
}

impl LocalBackend {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string());
        // Fail on unknown names before any download is attempted.
        config_to_fastembed_model(&model_name)?;
        let width = local_model_dims(&model_name).ok_or_else(|| {
            Error::Config(format!("unknown local embedding model: '{}'", model_name))
        })?;
        let dims = match config.dims {
            Some(d) if d != width => {
                return Err(Error::Config(format!(
                    "embedding.dims ({}) does not match local model '{}' ({} dims)",
                    d, model_name, width
                )))
            }
            _ => width,
        };

        Ok(Self {
            model_name,
            dims,
            cache_dir: config.cache_dir.clone(),
        })
    }

    async fn model(&self) -> Result<Arc<LoadedModel>> {
        let loaded = MODEL
            .get_or_try_init(|| load(self.model_name.clone(), self.cache_dir.clone()))
            .await?;
        if loaded.name != self.model_name {
            return Err(Error::Config(format!(
                "local model '{}' already loaded; cannot switch to '{}'",
                loaded.name, self.model_name
            )));
        }
        Ok(loaded.clone())
    }
}

async fn load(name: String, cache_dir: Option<PathBuf>) -> Result<Arc<LoadedModel>> {
    let model = config_to_fastembed_model(&name)?;
    tracing::info!(model = %name, dims = ?local_model_dims(&name), "loading local embedding model");

    tokio::task::spawn_blocking(move || {
        let mut options = InitOptions::new(model).with_show_download_progress(false);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir);
        }
        let engine = TextEmbedding::try_new(options).map_err(|e| {
            Error::embedding(format!("failed to initialize local embedding model: {}", e))
        })?;
        Ok(Arc::new(LoadedModel {
            name,
            engine: Mutex::new(engine),
        }))
    })
    .await
    .map_err(|e| Error::embedding(format!("model loader task failed: {}", e)))?
}

#[async_trait]
impl EmbeddingBackend for LocalBackend {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let loaded = self.model().await?;
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut engine = loaded
                .engine
                .lock()
                .map_err(|_| Error::embedding("local model lock poisoned"))?;
            // One text per forward pass so padding never depends on batch neighbours.
            engine
                .embed(texts, Some(1))
                .map_err(|e| Error::embedding(format!("local embedding failed: {}", e)))
        })
        .await
        .map_err(|e| Error::embedding(format!("embedding task failed: {}", e)))?
    }
}

fn config_to_fastembed_model(name: &str) -> Result<EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1" => Ok(EmbeddingModel::NomicEmbedTextV1),
        "nomic-embed-text-v1.5" => Ok(EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(EmbeddingModel::MultilingualE5Base),
        "multilingual-e5-large" => Ok(EmbeddingModel::MultilingualE5Large),
        other => Err(Error::Config(format!(
            "unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1, nomic-embed-text-v1.5, \
             multilingual-e5-small, multilingual-e5-base, multilingual-e5-large",
            other
        ))),
    }
}
