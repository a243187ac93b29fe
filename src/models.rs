//! Core data models used throughout the ingest and query pipelines.
//!
//! These types represent the documents, chunks, retrieval candidates, and
//! conversation turns that flow between the chunker, the stores, and the
//! orchestrator, plus the validated request shapes accepted at the boundary.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{RagError, RagResult};

/// Smallest accepted chunk size, in characters.
pub const MIN_CHUNK_SIZE: usize = 50;
/// Largest accepted chunk size, in characters.
pub const MAX_CHUNK_SIZE: usize = 2000;
/// Accepted `top_k` range for queries.
pub const MIN_TOP_K: usize = 1;
pub const MAX_TOP_K: usize = 10;

/// An ingested document. Immutable after creation; owns its chunks.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub content_type: String,
    pub body: String,
    pub created_at: i64,
}

/// A retrievable unit of a document's text.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    /// Zero-based position within the owning document.
    pub index_in_document: i64,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
    /// Opaque vector-index key, set once after the chunk is indexed.
    pub embedding_id: Option<String>,
}

impl Chunk {
    /// New chunk row with a fresh id and the SHA-256 of its text.
    pub fn new(document_id: &str, index_in_document: i64, text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let hash = format!("{:x}", hasher.finalize());

        Self {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            index_in_document,
            text: text.to_string(),
            hash,
            embedding_id: None,
        }
    }
}

/// A candidate returned by the vector index for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub document_id: String,
    /// May be empty when the index returned only an identifier.
    pub text: String,
    /// Similarity score; higher is more relevant.
    pub score: f32,
}

/// Message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => anyhow::bail!("unknown role: '{}'", other),
        }
    }
}

/// One entry of a session's conversation log. Immutable once written.
///
/// Serialized as `{ "role", "content", "timestamp" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn at(role: Role, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
        }
    }
}

/// A prompt message sent to a generation backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

impl From<&ChatTurn> for ChatMessage {
    fn from(turn: &ChatTurn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

/// Text segmentation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingStrategy {
    /// Separator hierarchy: paragraphs, lines, sentences, spaces.
    Recursive,
    /// Sliding window of `size` characters advancing by `size - overlap`.
    Fixed,
}

impl ChunkingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkingStrategy::Recursive => "recursive",
            ChunkingStrategy::Fixed => "fixed",
        }
    }
}

impl FromStr for ChunkingStrategy {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recursive" => Ok(ChunkingStrategy::Recursive),
            "fixed" => Ok(ChunkingStrategy::Fixed),
            _ => Err(RagError::invalid(
                "strategy must be either 'recursive' or 'fixed'",
            )),
        }
    }
}

/// Chunking parameters as accepted at the ingest boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingParams {
    pub strategy: ChunkingStrategy,
    pub size: usize,
    pub overlap: usize,
}

impl ChunkingParams {
    /// Rejects sizes outside 50–2000 and overlaps not strictly below `size`.
    pub fn validate(&self) -> RagResult<()> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.size) {
            return Err(RagError::invalid(format!(
                "size must be between {} and {}",
                MIN_CHUNK_SIZE, MAX_CHUNK_SIZE
            )));
        }
        if self.overlap >= self.size {
            return Err(RagError::invalid(
                "overlap must be at least 0 and less than size",
            ));
        }
        Ok(())
    }
}

/// Descriptive fields recorded with a document at ingest.
#[derive(Debug, Clone, Default)]
pub struct DocumentMeta {
    pub filename: String,
    pub content_type: String,
}

/// Result of indexing one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestOutcome {
    pub document_id: String,
    pub num_chunks: usize,
}

/// A question for the query pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub session_id: String,
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    5
}

impl QueryRequest {
    pub fn new(session_id: impl Into<String>, query: impl Into<String>, top_k: usize) -> Self {
        Self {
            session_id: session_id.into(),
            query: query.into(),
            top_k,
        }
    }

    pub fn validate(&self, max_query_chars: usize) -> RagResult<()> {
        if self.session_id.trim().is_empty() {
            return Err(RagError::invalid("session_id must not be empty"));
        }
        if self.query.trim().is_empty() {
            return Err(RagError::invalid("query must not be empty"));
        }
        if self.query.chars().count() > max_query_chars {
            return Err(RagError::invalid(format!(
                "query must be at most {} characters",
                max_query_chars
            )));
        }
        if !(MIN_TOP_K..=MAX_TOP_K).contains(&self.top_k) {
            return Err(RagError::invalid(format!(
                "top_k must be between {} and {}",
                MIN_TOP_K, MAX_TOP_K
            )));
        }
        Ok(())
    }
}

/// Answer produced by the query pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryAnswer {
    pub answer: String,
    /// Contributing chunk ids, in retrieval order.
    pub sources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parse() {
        assert_eq!(
            "recursive".parse::<ChunkingStrategy>().unwrap(),
            ChunkingStrategy::Recursive
        );
        assert_eq!(
            "fixed".parse::<ChunkingStrategy>().unwrap(),
            ChunkingStrategy::Fixed
        );
        let err = "semantic".parse::<ChunkingStrategy>().unwrap_err();
        assert!(err.is_client_fault());
    }

    #[test]
    fn test_chunking_params_bounds() {
        let ok = ChunkingParams {
            strategy: ChunkingStrategy::Fixed,
            size: 500,
            overlap: 50,
        };
        assert!(ok.validate().is_ok());

        let too_small = ChunkingParams { size: 49, ..ok };
        assert!(too_small.validate().is_err());
        let too_large = ChunkingParams { size: 2001, ..ok };
        assert!(too_large.validate().is_err());
        let overlap_eq = ChunkingParams {
            size: 100,
            overlap: 100,
            ..ok
        };
        assert!(overlap_eq.validate().is_err());
        let edges = ChunkingParams {
            size: 50,
            overlap: 49,
            ..ok
        };
        assert!(edges.validate().is_ok());
    }

    #[test]
    fn test_query_request_validation() {
        assert!(QueryRequest::new("s1", "what is rust?", 5).validate(1000).is_ok());
        assert!(QueryRequest::new("", "q", 5).validate(1000).is_err());
        assert!(QueryRequest::new("s1", "   ", 5).validate(1000).is_err());
        assert!(QueryRequest::new("s1", "q", 0).validate(1000).is_err());
        assert!(QueryRequest::new("s1", "q", 11).validate(1000).is_err());
        assert!(QueryRequest::new("s1", "x".repeat(1001), 5)
            .validate(1000)
            .is_err());
    }

    #[test]
    fn test_chat_turn_wire_shape() {
        let turn = ChatTurn::new(Role::Assistant, "hello");
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "hello");
        assert!(json["timestamp"].is_string());

        let back: ChatTurn = serde_json::from_value(json).unwrap();
        assert_eq!(back, turn);
    }

    #[test]
    fn test_query_request_default_top_k() {
        let req: QueryRequest =
            serde_json::from_str(r#"{"session_id":"a","query":"b"}"#).unwrap();
        assert_eq!(req.top_k, 5);
    }
}
