//! In-memory [`ChunkStore`] for tests and ephemeral runs.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{Chunk, Document};

use super::{ChunkStore, DocumentRecord};

#[derive(Default)]
struct Tables {
    docs: HashMap<String, Document>,
    chunks: HashMap<String, Chunk>,
}

/// In-memory store. Both tables live behind one lock so a document and its
/// chunks always appear together.
#[derive(Default)]
pub struct InMemoryChunkStore {
    tables: RwLock<Tables>,
}

impl InMemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no document is stored.
    pub fn is_empty(&self) -> Result<bool> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables.docs.is_empty() && tables.chunks.is_empty())
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("chunk store lock poisoned")
}

#[async_trait]
impl ChunkStore for InMemoryChunkStore {
    async fn insert_document(&self, doc: &Document, chunks: &[Chunk]) -> Result<()> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        if tables.docs.contains_key(&doc.id) {
            anyhow::bail!("document {} already exists", doc.id);
        }
        tables.docs.insert(doc.id.clone(), doc.clone());
        for c in chunks {
            tables.chunks.insert(c.id.clone(), c.clone());
        }
        Ok(())
    }

    async fn delete_document(&self, id: &str) -> Result<bool> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        let existed = tables.docs.remove(id).is_some();
        tables.chunks.retain(|_, c| c.document_id != id);
        Ok(existed)
    }

    async fn get_document(&self, id: &str) -> Result<Option<DocumentRecord>> {
        let tables = self.tables.read().map_err(poisoned)?;
        let document = match tables.docs.get(id) {
            Some(d) => d.clone(),
            None => return Ok(None),
        };
        let mut chunks: Vec<Chunk> = tables
            .chunks
            .values()
            .filter(|c| c.document_id == id)
            .cloned()
            .collect();
        chunks.sort_by_key(|c| c.index_in_document);
        Ok(Some(DocumentRecord { document, chunks }))
    }

    async fn chunk_texts(&self, chunk_ids: &[String]) -> Result<HashMap<String, String>> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(chunk_ids
            .iter()
            .filter_map(|id| tables.chunks.get(id).map(|c| (id.clone(), c.text.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str) -> Document {
        Document {
            id: id.to_string(),
            filename: "a.txt".to_string(),
            content_type: "text/plain".to_string(),
            body: "alpha beta".to_string(),
            created_at: 0,
        }
    }

    #[tokio::test]
    async fn test_insert_get_delete() {
        let store = InMemoryChunkStore::new();
        let chunks = vec![Chunk::new("d1", 1, "beta"), Chunk::new("d1", 0, "alpha")];
        store.insert_document(&doc("d1"), &chunks).await.unwrap();

        let record = store.get_document("d1").await.unwrap().unwrap();
        let texts: Vec<&str> = record.chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["alpha", "beta"]);

        assert!(store.delete_document("d1").await.unwrap());
        assert!(store.get_document("d1").await.unwrap().is_none());
        assert!(!store.delete_document("d1").await.unwrap());
    }

    #[tokio::test]
    async fn test_chunk_texts_skips_unknown_ids() {
        let store = InMemoryChunkStore::new();
        let chunk = Chunk::new("d1", 0, "alpha");
        store
            .insert_document(&doc("d1"), std::slice::from_ref(&chunk))
            .await
            .unwrap();

        let texts = store
            .chunk_texts(&[chunk.id.clone(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[&chunk.id], "alpha");
    }
}
