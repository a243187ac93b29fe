//! Relational storage for documents and their chunks.
//!
//! The [`ChunkStore`] trait is the orchestrator's only view of document and
//! chunk rows. Two implementations ship with the crate:
//!
//! - [`sqlite::SqliteChunkStore`]: `documents` / `chunks` tables via sqlx.
//! - [`memory::InMemoryChunkStore`]: `HashMap`s behind a lock, for tests and
//!   throwaway sessions.
//!
//! Implementations must be `Send + Sync`; one instance is shared by every
//! request.

pub mod memory;
pub mod sqlite;

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Chunk, Document};

/// A document with its chunks ordered by `index_in_document`.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub document: Document,
    pub chunks: Vec<Chunk>,
}

#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Persist a document and all of its chunks as one unit.
    ///
    /// Either every row becomes visible or none does.
    async fn insert_document(&self, doc: &Document, chunks: &[Chunk]) -> Result<()>;

    /// Remove a document and its chunks. Returns whether it existed.
    async fn delete_document(&self, id: &str) -> Result<bool>;

    /// Retrieve a document with its chunks, by ID.
    async fn get_document(&self, id: &str) -> Result<Option<DocumentRecord>>;

    /// Authoritative text for each known chunk id. Unknown ids are absent
    /// from the map.
    async fn chunk_texts(&self, chunk_ids: &[String]) -> Result<HashMap<String, String>>;
}
