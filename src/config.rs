use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// Per-extractor extension allow-lists, keyed by extractor name.
    #[serde(default)]
    pub extractors: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            max_file_size_mb: default_max_file_size_mb(),
        }
    }
}

impl StorageConfig {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./uploads")
}
fn default_max_file_size_mb() -> u64 {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            overlap: default_overlap(),
        }
    }
}

fn default_window() -> usize {
    500
}
fn default_overlap() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base URL for the `ollama` provider.
    #[serde(default)]
    pub url: Option<String>,
    /// Model cache directory for the `local` provider.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            url: None,
            cache_dir: None,
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProcessingConfig {
    #[serde(default = "default_extraction_timeout_secs")]
    pub extraction_timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            extraction_timeout_secs: default_extraction_timeout_secs(),
        }
    }
}

fn default_extraction_timeout_secs() -> u64 {
    120
}

/// Extractor names accepted as keys of the `[extractors]` table.
pub const EXTRACTOR_NAMES: [&str; 7] = [
    "pdf",
    "docx",
    "spreadsheet",
    "text",
    "audio",
    "video",
    "image",
];

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.window == 0 {
        bail!("chunking.window must be > 0");
    }
    if config.chunking.overlap >= config.chunking.window {
        bail!(
            "chunking.overlap ({}) must be smaller than chunking.window ({})",
            config.chunking.overlap,
            config.chunking.window
        );
    }

    // Validate storage
    if config.storage.max_file_size_mb == 0 {
        bail!("storage.max_file_size_mb must be > 0");
    }

    // Validate embedding
    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    if config.embedding.timeout_secs == 0 {
        bail!("embedding.timeout_secs must be > 0");
    }
    match config.embedding.provider.as_str() {
        "hash" => {}
        "local" => {
            let model = config
                .embedding
                .model
                .as_deref()
                .unwrap_or(crate::embedding::DEFAULT_LOCAL_MODEL);
            let Some(width) = crate::embedding::local_model_dims(model) else {
                bail!("Unknown local embedding model: '{}'", model);
            };
            // dims is derived from the model for this provider
            if let Some(dims) = config.embedding.dims {
                if dims != width {
                    bail!(
                        "embedding.dims ({}) does not match local model '{}' ({} dims); \
                         omit dims for the local provider",
                        dims,
                        model,
                        width
                    );
                }
            }
        }
        "ollama" => {
            if config.embedding.dims.is_none() {
                bail!("embedding.dims must be specified when provider is 'ollama'");
            }
            if config.embedding.model.is_none() {
                bail!("embedding.model must be specified when provider is 'ollama'");
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be local, ollama, or hash.",
            other
        ),
    }

    if config.processing.extraction_timeout_secs == 0 {
        bail!("processing.extraction_timeout_secs must be > 0");
    }

    for (name, extensions) in &config.extractors {
        if !EXTRACTOR_NAMES.contains(&name.as_str()) {
            bail!(
                "Unknown extractor '{}' in [extractors]. Known: {}",
                name,
                EXTRACTOR_NAMES.join(", ")
            );
        }
        if extensions.is_empty() {
            bail!("extractors.{} must list at least one extension", name);
        }
    }

    Ok(config)
}
