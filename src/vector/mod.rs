//! Nearest-neighbour index over chunk embeddings.
//!
//! The orchestrator talks to the index only through [`VectorIndex`]:
//!
//! - [`sqlite::SqliteVectorIndex`] stores points as little-endian `f32`
//!   BLOBs in `vector_points` and scores them by brute-force cosine
//!   similarity.
//! - [`memory::InMemoryVectorIndex`] keeps points in a `Vec` behind a lock.
//!
//! Both create their collection on first upsert, recording the vector
//! dimension and the `cosine` metric, and reject vectors whose width does not
//! match the collection.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::RetrievedChunk;

/// Similarity metric recorded for every collection.
pub const METRIC_COSINE: &str = "cosine";

/// Data stored alongside each vector.
///
/// The chunk text is duplicated here so most queries need no chunk-store
/// round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorPayload {
    pub chunk_id: String,
    pub document_id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorPoint {
    /// Opaque key, unique across the collection. Matches `Chunk::embedding_id`.
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: VectorPayload,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace points by id.
    async fn upsert(&self, points: &[VectorPoint]) -> Result<()>;

    /// The `top_k` most similar points, highest score first.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievedChunk>>;

    /// Remove points by id. Unknown ids are ignored.
    async fn delete(&self, ids: &[String]) -> Result<()>;
}

/// Every point in a batch must share one width. Returns it, or `None` for an
/// empty batch.
fn batch_dims(points: &[VectorPoint]) -> Result<Option<usize>> {
    let Some(first) = points.first() else {
        return Ok(None);
    };
    let dims = first.vector.len();
    if dims == 0 {
        anyhow::bail!("cannot index an empty vector (point {})", first.id);
    }
    if let Some(p) = points.iter().find(|p| p.vector.len() != dims) {
        anyhow::bail!(
            "vector dimension mismatch in batch: point {} has {}, expected {}",
            p.id,
            p.vector.len(),
            dims
        );
    }
    Ok(Some(dims))
}

/// Sort candidates by score descending and keep `top_k`.
///
/// The sort is stable, so equal scores keep the order they were scanned in.
fn rank(mut scored: Vec<RetrievedChunk>, top_k: usize) -> Vec<RetrievedChunk> {
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(top_k);
    scored
}

#[cfg(test)]
pub(crate) fn point(id: &str, vector: Vec<f32>, text: &str) -> VectorPoint {
    VectorPoint {
        id: id.to_string(),
        vector,
        payload: VectorPayload {
            chunk_id: format!("chunk-{}", id),
            document_id: "doc-1".to_string(),
            text: text.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, score: f32) -> RetrievedChunk {
        RetrievedChunk {
            chunk_id: id.to_string(),
            document_id: "d".to_string(),
            text: String::new(),
            score,
        }
    }

    #[test]
    fn test_rank_sorts_descending_and_truncates() {
        let ranked = rank(vec![hit("a", 0.1), hit("b", 0.9), hit("c", 0.5)], 2);
        let ids: Vec<&str> = ranked.iter().map(|r| r.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_batch_dims() {
        assert_eq!(batch_dims(&[]).unwrap(), None);
        assert_eq!(
            batch_dims(&[point("1", vec![1.0, 0.0], "x")]).unwrap(),
            Some(2)
        );
        assert!(batch_dims(&[point("1", vec![1.0], "x"), point("2", vec![1.0, 0.0], "y")]).is_err());
        assert!(batch_dims(&[point("1", vec![], "x")]).is_err());
    }
}
