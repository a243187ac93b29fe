//! Document retrieval and removal by ID.
//!
//! Used by the `ragd get` / `ragd delete` CLI commands and the
//! `GET|DELETE /documents/{id}` HTTP endpoints.

use anyhow::Result;
use serde::Serialize;

use crate::app;
use crate::config::Config;
use crate::store::DocumentRecord;

#[derive(Debug, Clone, Serialize)]
pub struct DocumentResponse {
    pub id: String,
    pub filename: String,
    pub content_type: String,
    pub created_at: String, // ISO8601
    pub body: String,
    pub chunks: Vec<ChunkResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkResponse {
    pub id: String,
    pub index: i64,
    pub text: String,
    pub embedding_id: Option<String>,
}

impl From<DocumentRecord> for DocumentResponse {
    fn from(record: DocumentRecord) -> Self {
        let doc = record.document;
        Self {
            id: doc.id,
            filename: doc.filename,
            content_type: doc.content_type,
            created_at: format_ts_iso(doc.created_at),
            body: doc.body,
            chunks: record
                .chunks
                .into_iter()
                .map(|c| ChunkResponse {
                    id: c.id,
                    index: c.index_in_document,
                    text: c.text,
                    embedding_id: c.embedding_id,
                })
                .collect(),
        }
    }
}

/// CLI entry point: prints the document and its chunks to stdout.
pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    let pipeline = app::build_pipeline(config).await?;
    let doc: DocumentResponse = match pipeline.get_document(id).await? {
        Some(record) => record.into(),
        None => anyhow::bail!("document not found: {}", id),
    };

    println!("--- Document ---");
    println!("id:           {}", doc.id);
    println!("filename:     {}", doc.filename);
    println!("content_type: {}", doc.content_type);
    println!("created_at:   {}", doc.created_at);
    println!();

    println!("--- Body ---");
    println!("{}", doc.body);
    println!();

    println!("--- Chunks ({}) ---", doc.chunks.len());
    for chunk in &doc.chunks {
        println!("[chunk {}] {}", chunk.index, chunk.id);
        println!("{}", chunk.text);
        println!();
    }

    Ok(())
}

pub async fn run_delete(config: &Config, id: &str) -> Result<()> {
    let pipeline = app::build_pipeline(config).await?;
    if !pipeline.delete_document(id).await? {
        anyhow::bail!("document not found: {}", id);
    }
    println!("deleted {}", id);
    Ok(())
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, Document};

    #[test]
    fn test_response_from_record() {
        let record = DocumentRecord {
            document: Document {
                id: "d1".to_string(),
                filename: "a.txt".to_string(),
                content_type: "text/plain".to_string(),
                body: "alpha".to_string(),
                created_at: 0,
            },
            chunks: vec![Chunk::new("d1", 0, "alpha")],
        };
        let resp = DocumentResponse::from(record);
        assert_eq!(resp.created_at, "1970-01-01T00:00:00Z");
        assert_eq!(resp.chunks.len(), 1);
        assert_eq!(resp.chunks[0].index, 0);
    }
}
