//! SQLite-backed [`ChunkStore`].

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::models::{Chunk, Document};

use super::{ChunkStore, DocumentRecord};

/// Wraps a [`SqlitePool`] over the `documents` and `chunks` tables.
pub struct SqliteChunkStore {
    pool: SqlitePool,
}

impl SqliteChunkStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChunkStore for SqliteChunkStore {
    async fn insert_document(&self, doc: &Document, chunks: &[Chunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO documents (id, filename, content_type, body, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&doc.id)
        .bind(&doc.filename)
        .bind(&doc.content_type)
        .bind(&doc.body)
        .bind(doc.created_at)
        .execute(&mut *tx)
        .await?;

        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, document_id, index_in_document, text, hash, embedding_id)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(chunk.index_in_document)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .bind(&chunk.embedding_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_document(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(deleted > 0)
    }

    async fn get_document(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let row = sqlx::query(
            "SELECT id, filename, content_type, body, created_at FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let document = match row {
            Some(row) => Document {
                id: row.get("id"),
                filename: row.get("filename"),
                content_type: row.get("content_type"),
                body: row.get("body"),
                created_at: row.get("created_at"),
            },
            None => return Ok(None),
        };

        let chunks = sqlx::query(
            r#"
            SELECT id, document_id, index_in_document, text, hash, embedding_id
            FROM chunks
            WHERE document_id = ?
            ORDER BY index_in_document ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| Chunk {
            id: row.get("id"),
            document_id: row.get("document_id"),
            index_in_document: row.get("index_in_document"),
            text: row.get("text"),
            hash: row.get("hash"),
            embedding_id: row.get("embedding_id"),
        })
        .collect();

        Ok(Some(DocumentRecord { document, chunks }))
    }

    async fn chunk_texts(&self, chunk_ids: &[String]) -> Result<HashMap<String, String>> {
        if chunk_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id, text FROM chunks WHERE id IN (");
        let mut ids = qb.separated(", ");
        for id in chunk_ids {
            ids.push_bind(id);
        }
        ids.push_unseparated(")");

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get::<String, _>("id"), row.get::<String, _>("text")))
            .collect())
    }
}
