//! Feature-hashing embedder.
//!
//! Lower-cased alphanumeric tokens are hashed (FNV-1a) into a fixed number of
//! buckets with a hash-derived sign, then the vector is L2-normalised. Texts
//! sharing words land close together under cosine similarity. Needs no model
//! and no network, so it backs tests and air-gapped installs.

use anyhow::Result;
use async_trait::async_trait;

use super::EmbeddingProvider;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

pub struct HashingProvider {
    dims: usize,
}

impl HashingProvider {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let h = fnv1a(&token.to_lowercase());
            let bucket = (h % self.dims as u64) as usize;
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign;
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

fn fnv1a(s: &str) -> u64 {
    s.bytes().fold(FNV_OFFSET, |h, b| (h ^ b as u64).wrapping_mul(FNV_PRIME))
}

#[async_trait]
impl EmbeddingProvider for HashingProvider {
    fn model_name(&self) -> &str {
        "hash"
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_similarity;

    #[test]
    fn test_deterministic_and_normalised() {
        let p = HashingProvider::new(64);
        let a = p.embed_one("Rust cargo crates");
        let b = p.embed_one("rust CARGO crates");
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_shared_words_score_higher() {
        let p = HashingProvider::new(384);
        let q = p.embed_one("deployment kubernetes");
        let near = p.embed_one("Notes about deployment on kubernetes clusters");
        let far = p.embed_one("Python machine learning frameworks");
        assert!(cosine_similarity(&q, &near) > cosine_similarity(&q, &far));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let p = HashingProvider::new(8);
        assert!(p.embed_one("  ...  ").iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_batch_matches_single() {
        let p = HashingProvider::new(32);
        let texts = vec!["alpha".to_string(), "beta gamma".to_string()];
        let out = p.embed(&texts).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1], p.embed_one("beta gamma"));
    }
}
