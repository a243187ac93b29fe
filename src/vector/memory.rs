//! In-memory [`VectorIndex`].

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::RetrievedChunk;

use super::{batch_dims, rank, VectorIndex, VectorPoint};

#[derive(Default)]
struct Collection {
    dims: Option<usize>,
    points: Vec<VectorPoint>,
}

#[derive(Default)]
pub struct InMemoryVectorIndex {
    inner: RwLock<Collection>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|c| c.points.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("vector index lock poisoned")
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn upsert(&self, points: &[VectorPoint]) -> Result<()> {
        let Some(dims) = batch_dims(points)? else {
            return Ok(());
        };

        let mut coll = self.inner.write().map_err(poisoned)?;
        match coll.dims {
            Some(existing) if existing != dims => anyhow::bail!(
                "vector dimension mismatch: collection has {}, got {}",
                existing,
                dims
            ),
            Some(_) => {}
            None => coll.dims = Some(dims),
        }

        for p in points {
            match coll.points.iter_mut().find(|existing| existing.id == p.id) {
                Some(existing) => *existing = p.clone(),
                None => coll.points.push(p.clone()),
            }
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievedChunk>> {
        let coll = self.inner.read().map_err(poisoned)?;
        if let Some(dims) = coll.dims {
            if dims != vector.len() {
                anyhow::bail!(
                    "query vector has {} dimensions, collection has {}",
                    vector.len(),
                    dims
                );
            }
        }

        let scored = coll
            .points
            .iter()
            .map(|p| RetrievedChunk {
                chunk_id: p.payload.chunk_id.clone(),
                document_id: p.payload.document_id.clone(),
                text: p.payload.text.clone(),
                score: cosine_similarity(vector, &p.vector),
            })
            .collect();
        Ok(rank(scored, top_k))
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let mut coll = self.inner.write().map_err(poisoned)?;
        coll.points.retain(|p| !ids.contains(&p.id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::point;

    #[tokio::test]
    async fn test_query_orders_by_score() {
        let index = InMemoryVectorIndex::new();
        index
            .upsert(&[
                point("a", vec![1.0, 0.0], "east"),
                point("b", vec![0.0, 1.0], "north"),
                point("c", vec![0.7, 0.7], "north-east"),
            ])
            .await
            .unwrap();

        let hits = index.query(&[1.0, 0.1], 3).await.unwrap();
        let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["east", "north-east", "north"]);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));

        assert_eq!(index.query(&[1.0, 0.0], 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_per_id() {
        let index = InMemoryVectorIndex::new();
        index.upsert(&[point("a", vec![1.0, 0.0], "v1")]).await.unwrap();
        index.upsert(&[point("a", vec![0.0, 1.0], "v2")]).await.unwrap();
        assert_eq!(index.len(), 1);
        let hits = index.query(&[0.0, 1.0], 5).await.unwrap();
        assert_eq!(hits[0].text, "v2");
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let index = InMemoryVectorIndex::new();
        index.upsert(&[point("a", vec![1.0, 0.0], "x")]).await.unwrap();
        assert!(index.upsert(&[point("b", vec![1.0, 0.0, 0.0], "y")]).await.is_err());
        assert!(index.query(&[1.0], 1).await.is_err());
    }

    #[tokio::test]
    async fn test_delete() {
        let index = InMemoryVectorIndex::new();
        index
            .upsert(&[point("a", vec![1.0], "x"), point("b", vec![1.0], "y")])
            .await
            .unwrap();
        index
            .delete(&["a".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(index.len(), 1);
        assert!(InMemoryVectorIndex::new().query(&[1.0], 3).await.unwrap().is_empty());
    }
}
