//! Model-free embedding by signed feature hashing.
//!
//! Each lowercase alphanumeric token is hashed with SHA-256; the first
//! four bytes pick a bucket and the fifth a sign. The summed vector is
//! L2-normalized. Output depends only on the text, so it is stable
//! across runs and machines.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::EmbeddingBackend;
use crate::error::Result;

pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let bucket =
                u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]) as usize % self.dims;
            let sign = if digest[4] & 1 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

#[async_trait]
impl EmbeddingBackend for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_similarity;

    #[test]
    fn deterministic_and_normalized() {
        let e = HashEmbedder::new(64);
        let a = e.embed_one("Hello, world");
        assert_eq!(a, e.embed_one("hello WORLD"));
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn shared_tokens_score_higher() {
        let e = HashEmbedder::new(256);
        let q = e.embed_one("invoice payment terms");
        let near = e.embed_one("payment terms for this invoice");
        let far = e.embed_one("mountain hiking trail");
        assert!(cosine_similarity(&q, &near).unwrap() > cosine_similarity(&q, &far).unwrap());
    }

    #[test]
    fn punctuation_only_is_zero() {
        let e = HashEmbedder::new(8);
        assert!(e.embed_one("--- ...").iter().all(|x| *x == 0.0));
    }
}
