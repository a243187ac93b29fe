//! SQLite-backed [`VectorIndex`].
//!
//! Vectors are stored as BLOBs in `vector_points`, keyed by
//! `(collection, id)`. Queries load every point of the collection and score
//! them with [`cosine_similarity`]; adequate for the corpus sizes a single
//! SQLite file serves.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::RetrievedChunk;

use super::{batch_dims, rank, VectorIndex, VectorPoint, METRIC_COSINE};

pub struct SqliteVectorIndex {
    pool: SqlitePool,
    collection: String,
}

impl SqliteVectorIndex {
    pub fn new(pool: SqlitePool, collection: impl Into<String>) -> Self {
        Self {
            pool,
            collection: collection.into(),
        }
    }

    async fn collection_dims(&self) -> Result<Option<usize>> {
        let dims: Option<i64> =
            sqlx::query_scalar("SELECT dims FROM vector_collections WHERE name = ?")
                .bind(&self.collection)
                .fetch_optional(&self.pool)
                .await?;
        Ok(dims.map(|d| d as usize))
    }
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn upsert(&self, points: &[VectorPoint]) -> Result<()> {
        let Some(dims) = batch_dims(points)? else {
            return Ok(());
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO vector_collections (name, dims, metric) VALUES (?, ?, ?) ON CONFLICT(name) DO NOTHING",
        )
        .bind(&self.collection)
        .bind(dims as i64)
        .bind(METRIC_COSINE)
        .execute(&mut *tx)
        .await?;

        let existing: i64 = sqlx::query_scalar("SELECT dims FROM vector_collections WHERE name = ?")
            .bind(&self.collection)
            .fetch_one(&mut *tx)
            .await?;
        if existing as usize != dims {
            anyhow::bail!(
                "vector dimension mismatch: collection '{}' has {}, got {}",
                self.collection,
                existing,
                dims
            );
        }

        for p in points {
            sqlx::query(
                r#"
                INSERT INTO vector_points (id, collection, chunk_id, document_id, text, embedding)
                VALUES (?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    chunk_id = excluded.chunk_id,
                    document_id = excluded.document_id,
                    text = excluded.text,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&p.id)
            .bind(&self.collection)
            .bind(&p.payload.chunk_id)
            .bind(&p.payload.document_id)
            .bind(&p.payload.text)
            .bind(vec_to_blob(&p.vector))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<RetrievedChunk>> {
        match self.collection_dims().await? {
            None => return Ok(Vec::new()),
            Some(dims) if dims != vector.len() => anyhow::bail!(
                "query vector has {} dimensions, collection '{}' has {}",
                vector.len(),
                self.collection,
                dims
            ),
            Some(_) => {}
        }

        let rows = sqlx::query(
            r#"
            SELECT chunk_id, document_id, text, embedding
            FROM vector_points
            WHERE collection = ?
            ORDER BY rowid ASC
            "#,
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await?;

        let scored = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                RetrievedChunk {
                    chunk_id: row.get("chunk_id"),
                    document_id: row.get("document_id"),
                    text: row.get("text"),
                    score: cosine_similarity(vector, &blob_to_vec(&blob)),
                }
            })
            .collect();

        Ok(rank(scored, top_k))
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM vector_points WHERE collection = ");
        qb.push_bind(&self.collection);
        qb.push(" AND id IN (");
        let mut list = qb.separated(", ");
        for id in ids {
            list.push_bind(id);
        }
        list.push_unseparated(")");

        qb.build().execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::run_migrations;
    use crate::vector::point;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn index(collection: &str) -> SqliteVectorIndex {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteVectorIndex::new(pool, collection)
    }

    #[tokio::test]
    async fn test_creates_collection_with_cosine_metric() {
        let index = index("documents").await;
        assert!(index.query(&[1.0, 0.0], 5).await.unwrap().is_empty());

        index.upsert(&[point("a", vec![1.0, 0.0], "x")]).await.unwrap();
        let row = sqlx::query("SELECT dims, metric FROM vector_collections WHERE name = 'documents'")
            .fetch_one(&index.pool)
            .await
            .unwrap();
        assert_eq!(row.get::<i64, _>("dims"), 2);
        assert_eq!(row.get::<String, _>("metric"), "cosine");
    }

    #[tokio::test]
    async fn test_query_scores_descending_with_payload() {
        let index = index("documents").await;
        index
            .upsert(&[
                point("a", vec![0.0, 1.0], "north"),
                point("b", vec![1.0, 0.0], "east"),
            ])
            .await
            .unwrap();

        let hits = index.query(&[0.9, 0.1], 2).await.unwrap();
        assert_eq!(hits[0].text, "east");
        assert_eq!(hits[0].chunk_id, "chunk-b");
        assert_eq!(hits[0].document_id, "doc-1");
        assert!(hits[0].score > hits[1].score);
    }

    #[tokio::test]
    async fn test_upsert_replaces_and_delete_removes() {
        let index = index("documents").await;
        index.upsert(&[point("a", vec![1.0, 0.0], "old")]).await.unwrap();
        index.upsert(&[point("a", vec![1.0, 0.0], "new")]).await.unwrap();
        let hits = index.query(&[1.0, 0.0], 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "new");

        index.delete(&["a".to_string()]).await.unwrap();
        assert!(index.query(&[1.0, 0.0], 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dimension_mismatch_leaves_no_points() {
        let index = index("documents").await;
        index.upsert(&[point("a", vec![1.0, 0.0], "x")]).await.unwrap();
        assert!(index
            .upsert(&[point("b", vec![1.0, 0.0, 0.0], "y")])
            .await
            .is_err());
        assert_eq!(index.query(&[1.0, 0.0], 10).await.unwrap().len(), 1);
    }
}
