use anyhow::{bail, Result};
use async_trait::async_trait;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use retrieve_core::traits::EmbeddingBackend;

/// Deterministic bag-of-tokens embedder. Each whitespace token lands in an
/// xxhash bucket; the result is L2-normalised. Texts sharing tokens get a
/// positive cosine similarity, which is enough for tests and offline demos.
/// Text without tokens has no direction and is reported as an error.
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = ((h >> 32) as u32) as f32 / u32::MAX as f32;
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

#[async_trait]
impl EmbeddingBackend for HashEmbedder {
    fn name(&self) -> &str {
        "hash"
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.split_whitespace().next().is_none() {
            bail!("no tokens to embed");
        }
        Ok(self.embed_sync(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn vectors_are_normalised_and_deterministic() {
        let e = HashEmbedder::new(64);
        let a = e.embed_sync("hello world");
        let b = e.embed_sync("hello world");
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() <= 1e-3, "norm={norm}");
        assert_eq!(a, b);
    }

    #[test]
    fn shared_tokens_score_higher_than_disjoint() {
        let e = HashEmbedder::new(256);
        let q = e.embed_sync("systems thinking");
        let near = e.embed_sync("systems thinking basics");
        let far = e.embed_sync("banana bread recipe");
        assert!(cosine(&q, &near) > cosine(&q, &far));
    }

    #[tokio::test]
    async fn text_without_tokens_is_an_error() {
        let e = HashEmbedder::new(8);
        assert!(e.embed("").await.is_err());
        assert!(e.embed(" \n\t ").await.is_err());
        assert_eq!(e.embed("x").await.unwrap().len(), 8);
    }
}
