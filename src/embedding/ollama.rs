//! Ollama backend.
//!
//! Calls `POST /api/embed` on the configured URL (default
//! `http://localhost:11434`). Requires an embedding model to be pulled,
//! e.g. `ollama pull nomic-embed-text`.
//!
//! Retry strategy: HTTP 429, 5xx and connection errors are retried with
//! exponential backoff (1s, 2s, 4s, … capped at 32s); other 4xx fail
//! immediately.

use std::time::Duration;

use async_trait::async_trait;

use super::EmbeddingBackend;
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

pub struct OllamaBackend {
    model: String,
    dims: usize,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| Error::Config("embedding.model required for Ollama provider".into()))?;
        let dims = config
            .dims
            .ok_or_else(|| Error::Config("embedding.dims required for Ollama provider".into()))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            model,
            dims,
            url: url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            client,
        })
    }
}

#[async_trait]
impl EmbeddingBackend for OllamaBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(format!("{}/api/embed", self.url))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| Error::embedding(format!("invalid Ollama response: {}", e)))?;
                        return parse_ollama_response(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = Error::embedding(format!("Ollama API error {}: {}", status, body_text));
                    if status.as_u16() == 429 || status.is_server_error() {
                        tracing::warn!(attempt, %status, "Ollama request failed, retrying");
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    last_err = Some(Error::embedding(format!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        self.url, e
                    )));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::embedding("Ollama embedding failed after retries")))
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| Error::embedding("invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|embedding| {
            embedding
                .as_array()
                .ok_or_else(|| Error::embedding("invalid Ollama response: embedding is not an array"))
                .and_then(|values| {
                    values
                        .iter()
                        .map(|v| {
                            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                                Error::embedding(
                                    "invalid Ollama response: non-numeric embedding value",
                                )
                            })
                        })
                        .collect()
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_embed_response() {
        let json = serde_json::json!({
            "model": "nomic-embed-text",
            "embeddings": [[0.1, 0.2], [0.3, 0.4]]
        });
        let out = parse_ollama_response(&json).unwrap();
        assert_eq!(out.len(), 2);
        assert!((out[1][0] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn rejects_malformed_response() {
        let json = serde_json::json!({ "embedding": [0.1] });
        assert!(parse_ollama_response(&json).is_err());
    }

    #[test]
    fn rejects_non_numeric_values() {
        let json = serde_json::json!({ "embeddings": [[0.1, "0.2", null]] });
        let err = parse_ollama_response(&json).unwrap_err();
        assert!(matches!(err, Error::Embedding(ref msg) if msg.contains("non-numeric")));
    }

    #[test]
    fn requires_model_and_dims() {
        let config = EmbeddingConfig {
            provider: "ollama".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(matches!(OllamaBackend::new(&config), Err(Error::Config(_))));
    }
}
