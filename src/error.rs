//! Error taxonomy for the ingest and query pipelines.
//!
//! Internal plumbing (database, HTTP clients, config) reports failures as
//! [`anyhow::Error`]. The pipeline surface converts them into [`RagError`],
//! which carries the category the boundary layer needs to pick a response:
//!
//! | Variant | Fault | Typical cause |
//! |---------|-------|---------------|
//! | [`RagError::InvalidInput`] | client | bad strategy, size/overlap out of range, empty query |
//! | [`RagError::Extraction`] | client | no text could be derived from the uploaded bytes |
//! | [`RagError::Provider`] | server | embedding, vector index, or generation backend failed |
//! | [`RagError::Timeout`] | server | an external call exceeded its time budget |
//! | [`RagError::Memory`] | server | the session-memory store rejected a write |
//! | [`RagError::Storage`] | server | the chunk store failed |
//! | [`RagError::Internal`] | server | a worker task panicked or was cancelled |

use std::fmt;

use crate::extract::ExtractError;

/// Pipeline stage that crosses a process boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Embed,
    VectorUpsert,
    VectorQuery,
    Generate,
    MemoryWrite,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Embed => "embedding",
            Stage::VectorUpsert => "vector upsert",
            Stage::VectorQuery => "vector query",
            Stage::Generate => "generation",
            Stage::MemoryWrite => "session memory write",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    Extraction(String),

    #[error("{stage} failed: {source:#}")]
    Provider {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },

    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: Stage, secs: u64 },

    #[error("session memory error: {0:#}")]
    Memory(#[source] anyhow::Error),

    #[error("storage error: {0:#}")]
    Storage(#[source] anyhow::Error),

    #[error("internal error: {0:#}")]
    Internal(#[source] anyhow::Error),
}

impl RagError {
    pub fn invalid(message: impl Into<String>) -> Self {
        RagError::InvalidInput(message.into())
    }

    pub fn provider(stage: Stage, source: anyhow::Error) -> Self {
        RagError::Provider { stage, source }
    }

    /// True for failures caused by the caller's input rather than by a backend.
    pub fn is_client_fault(&self) -> bool {
        matches!(self, RagError::InvalidInput(_) | RagError::Extraction(_))
    }
}

pub type RagResult<T> = std::result::Result<T, RagError>;

impl From<ExtractError> for RagError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::Unsupported | ExtractError::Empty => RagError::InvalidInput(err.to_string()),
            ExtractError::Pdf(_) | ExtractError::NoPdfText => RagError::Extraction(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for RagError {
    fn from(err: tokio::task::JoinError) -> Self {
        RagError::Internal(anyhow::anyhow!("worker task failed: {}", err))
    }
}
