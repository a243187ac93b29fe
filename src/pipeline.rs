//! Ingest and query orchestration.
//!
//! [`RagPipeline`] owns one handle to each collaborator (chunk store,
//! embedder, vector index, session memory, generator), all built once at
//! startup by [`crate::app::build_pipeline`] and shared by every request.
//!
//! # Ingest
//!
//! ```text
//! bytes ─► extract ─► chunk ─► embed (one batch) ─► upsert vectors ─► insert rows
//! ```
//!
//! Vectors are written before rows. If the row transaction fails, the
//! freshly upserted vector ids are deleted again, so no chunk row ever
//! references a missing vector and no vector outlives a failed ingest.
//!
//! # Query
//!
//! A single pass with no retries: embed, retrieve, backfill empty texts,
//! assemble context, merge recent history, build prompt, generate, persist
//! the exchange, return. Every external call is bounded by its stage
//! timeout. History is written only after generation succeeds; a failed
//! history read degrades to an empty history with a warning.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::Instrument;

use crate::chunk;
use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, RagResult, Stage};
use crate::extract;
use crate::generation::{GenerationProvider, SYSTEM_PROMPT};
use crate::memory::{self, SessionMemory};
use crate::models::{
    ChatMessage, ChatTurn, Chunk, ChunkingParams, ChunkingStrategy, Document, DocumentMeta,
    IngestOutcome, QueryAnswer, QueryRequest, RetrievedChunk,
};
use crate::store::{ChunkStore, DocumentRecord};
use crate::vector::{VectorIndex, VectorPayload, VectorPoint};

/// Deadline for each stage that leaves the process.
#[derive(Debug, Clone, Copy)]
pub struct StageTimeouts {
    pub embed: Duration,
    pub vector: Duration,
    pub generate: Duration,
    pub memory: Duration,
}

impl StageTimeouts {
    fn for_stage(&self, stage: Stage) -> Duration {
        match stage {
            Stage::Embed => self.embed,
            Stage::VectorUpsert | Stage::VectorQuery => self.vector,
            Stage::Generate => self.generate,
            Stage::MemoryWrite => self.memory,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Used when an ingest request does not specify its own parameters.
    pub chunking: ChunkingParams,
    pub top_k: usize,
    /// Most recent history turns included in each prompt.
    pub history_window: usize,
    pub max_query_chars: usize,
    pub timeouts: StageTimeouts,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chunking: ChunkingParams {
                strategy: ChunkingStrategy::Recursive,
                size: 500,
                overlap: 50,
            },
            top_k: 5,
            history_window: 10,
            max_query_chars: 1000,
            timeouts: StageTimeouts {
                embed: Duration::from_secs(30),
                vector: Duration::from_secs(30),
                generate: Duration::from_secs(60),
                memory: Duration::from_secs(5),
            },
        }
    }
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            chunking: config.chunking.params(),
            top_k: config.retrieval.top_k,
            history_window: config.retrieval.history_window,
            max_query_chars: config.retrieval.max_query_chars,
            timeouts: StageTimeouts {
                embed: Duration::from_secs(config.embedding.timeout_secs),
                vector: Duration::from_secs(config.vector.timeout_secs),
                generate: Duration::from_secs(config.generation.timeout_secs),
                memory: Duration::from_secs(config.memory.timeout_secs),
            },
        }
    }
}

pub struct RagPipeline {
    store: Arc<dyn ChunkStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    memory: Arc<dyn SessionMemory>,
    generator: Arc<dyn GenerationProvider>,
    settings: PipelineSettings,
}

impl RagPipeline {
    pub fn new(
        store: Arc<dyn ChunkStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        memory: Arc<dyn SessionMemory>,
        generator: Arc<dyn GenerationProvider>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            embedder,
            index,
            memory,
            generator,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn embedder_name(&self) -> &str {
        self.embedder.model_name()
    }

    pub fn generator_name(&self) -> &str {
        self.generator.name()
    }

    /// Run `fut` under the stage's deadline, classifying its failure.
    async fn bounded<T, F>(&self, stage: Stage, fut: F) -> RagResult<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        let limit = self.settings.timeouts.for_stage(stage);
        match tokio::time::timeout(limit, fut).await {
            Err(_) => Err(RagError::Timeout {
                stage,
                secs: limit.as_secs(),
            }),
            Ok(Err(e)) if stage == Stage::MemoryWrite => Err(RagError::Memory(e)),
            Ok(Err(e)) => Err(RagError::provider(stage, e)),
            Ok(Ok(v)) => Ok(v),
        }
    }

    // ============ Ingest ============

    /// Extract text from an upload and index it.
    ///
    /// `content_type` falls back to a guess from the filename.
    pub async fn ingest_bytes(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        content_type: Option<&str>,
        params: ChunkingParams,
    ) -> RagResult<IngestOutcome> {
        params.validate()?;
        let hint = content_type.unwrap_or_default();
        if !extract::is_supported(filename, hint) {
            return Err(extract::ExtractError::Unsupported.into());
        }
        let content_type = match hint {
            extract::MIME_PDF | extract::MIME_TEXT => hint,
            _ => extract::guess_content_type(filename),
        }
        .to_string();
        if bytes.is_empty() {
            return Err(extract::ExtractError::Empty.into());
        }

        let (name, ct) = (filename.to_string(), content_type.clone());
        let text =
            tokio::task::spawn_blocking(move || extract::extract_text(&bytes, &name, &ct)).await??;

        let meta = DocumentMeta {
            filename: filename.to_string(),
            content_type,
        };
        self.index_document(&text, meta, params).await
    }

    /// Chunk, embed, and index one document's text.
    pub async fn index_document(
        &self,
        text: &str,
        meta: DocumentMeta,
        params: ChunkingParams,
    ) -> RagResult<IngestOutcome> {
        params.validate()?;
        if text.trim().is_empty() {
            return Err(RagError::invalid("Empty file content"));
        }

        let document = Document {
            id: uuid::Uuid::new_v4().to_string(),
            filename: meta.filename,
            content_type: meta.content_type,
            body: text.to_string(),
            created_at: Utc::now().timestamp(),
        };

        let span = tracing::info_span!("ingest", document_id = %document.id, filename = %document.filename);
        self.index_inner(document, params).instrument(span).await
    }

    async fn index_inner(&self, document: Document, params: ChunkingParams) -> RagResult<IngestOutcome> {
        let started = Instant::now();

        let body = document.body.clone();
        let pieces = tokio::task::spawn_blocking(move || {
            chunk::split(&body, params.strategy, params.size, params.overlap)
        })
        .await?;

        let mut chunks: Vec<Chunk> = pieces
            .iter()
            .enumerate()
            .map(|(i, text)| Chunk::new(&document.id, i as i64, text))
            .collect();
        tracing::debug!(chunks = chunks.len(), strategy = params.strategy.as_str(), "chunked");

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.bounded(Stage::Embed, self.embedder.embed(&texts)).await?;
        if vectors.len() != chunks.len() {
            return Err(RagError::provider(
                Stage::Embed,
                anyhow::anyhow!(
                    "expected {} embeddings, got {}",
                    chunks.len(),
                    vectors.len()
                ),
            ));
        }

        let points: Vec<VectorPoint> = chunks
            .iter_mut()
            .zip(vectors)
            .map(|(chunk, vector)| {
                let id = uuid::Uuid::new_v4().to_string();
                chunk.embedding_id = Some(id.clone());
                VectorPoint {
                    id,
                    vector,
                    payload: VectorPayload {
                        chunk_id: chunk.id.clone(),
                        document_id: chunk.document_id.clone(),
                        text: chunk.text.clone(),
                    },
                }
            })
            .collect();
        let vector_ids: Vec<String> = points.iter().map(|p| p.id.clone()).collect();

        if let Err(e) = self.bounded(Stage::VectorUpsert, self.index.upsert(&points)).await {
            self.discard_vectors(&vector_ids).await;
            return Err(e);
        }

        if let Err(e) = self.store.insert_document(&document, &chunks).await {
            self.discard_vectors(&vector_ids).await;
            return Err(RagError::Storage(e));
        }

        tracing::info!(
            chunks = chunks.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "indexed document"
        );
        Ok(IngestOutcome {
            document_id: document.id,
            num_chunks: chunks.len(),
        })
    }

    /// Best-effort removal of vectors written by a failed ingest.
    async fn discard_vectors(&self, ids: &[String]) {
        if ids.is_empty() {
            return;
        }
        match self.bounded(Stage::VectorUpsert, self.index.delete(ids)).await {
            Ok(()) => tracing::debug!(count = ids.len(), "discarded vectors of failed ingest"),
            Err(e) => tracing::warn!(error = %e, count = ids.len(), "could not discard vectors of failed ingest"),
        }
    }

    pub async fn get_document(&self, id: &str) -> RagResult<Option<DocumentRecord>> {
        self.store.get_document(id).await.map_err(RagError::Storage)
    }

    /// Remove a document, its chunks, and their vectors. Returns whether the
    /// document existed.
    pub async fn delete_document(&self, id: &str) -> RagResult<bool> {
        let Some(record) = self.get_document(id).await? else {
            return Ok(false);
        };
        let vector_ids: Vec<String> = record
            .chunks
            .iter()
            .filter_map(|c| c.embedding_id.clone())
            .collect();
        if !vector_ids.is_empty() {
            self.bounded(Stage::VectorUpsert, self.index.delete(&vector_ids))
                .await?;
        }
        let deleted = self
            .store
            .delete_document(id)
            .await
            .map_err(RagError::Storage)?;
        tracing::info!(document_id = id, chunks = record.chunks.len(), "deleted document");
        Ok(deleted)
    }

    // ============ Query ============

    pub async fn query(&self, request: &QueryRequest) -> RagResult<QueryAnswer> {
        request.validate(self.settings.max_query_chars)?;
        let span = tracing::info_span!(
            "query",
            session_id = %request.session_id,
            top_k = request.top_k
        );
        self.query_inner(request).instrument(span).await
    }

    async fn query_inner(&self, request: &QueryRequest) -> RagResult<QueryAnswer> {
        let started = Instant::now();

        let query_vector = self
            .bounded(Stage::Embed, self.embedder.embed_query(&request.query))
            .await?;

        let mut candidates = self
            .bounded(
                Stage::VectorQuery,
                self.index.query(&query_vector, request.top_k),
            )
            .await?;
        tracing::debug!(candidates = candidates.len(), "retrieved");

        self.backfill(&mut candidates).await?;

        let context = build_context(&candidates);
        let history = self.recent_history(&request.session_id).await;
        let messages = build_prompt(&context, &history, &request.query);

        let answer = self
            .bounded(Stage::Generate, self.generator.generate(&messages))
            .await?;

        self.bounded(
            Stage::MemoryWrite,
            self.memory
                .append_turns(&request.session_id, &memory::exchange(&request.query, &answer)),
        )
        .await?;

        tracing::info!(
            sources = candidates.len(),
            history_turns = history.len(),
            generator = self.generator.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "answered query"
        );
        Ok(QueryAnswer {
            answer,
            sources: candidates.into_iter().map(|c| c.chunk_id).collect(),
        })
    }

    /// Fill empty candidate texts from the chunk store. Candidates whose text
    /// is still unknown stay in place with empty text.
    async fn backfill(&self, candidates: &mut [RetrievedChunk]) -> RagResult<()> {
        let missing: Vec<String> = candidates
            .iter()
            .filter(|c| c.text.is_empty())
            .map(|c| c.chunk_id.clone())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        let texts = self
            .store
            .chunk_texts(&missing)
            .await
            .map_err(RagError::Storage)?;
        for candidate in candidates.iter_mut().filter(|c| c.text.is_empty()) {
            if let Some(text) = texts.get(&candidate.chunk_id) {
                candidate.text = text.clone();
            }
        }
        tracing::debug!(missing = missing.len(), found = texts.len(), "backfilled chunk texts");
        Ok(())
    }

    /// The last `history_window` turns, oldest first. Read failures yield an
    /// empty history.
    async fn recent_history(&self, session_id: &str) -> Vec<ChatTurn> {
        let limit = self.settings.timeouts.memory;
        let mut turns = match tokio::time::timeout(limit, self.memory.get_history(session_id)).await {
            Ok(Ok(turns)) => turns,
            Ok(Err(e)) => {
                let error = format!("{:#}", e);
                tracing::warn!(%error, "session history unavailable; continuing without it");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(timeout_secs = limit.as_secs(), "session history read timed out; continuing without it");
                Vec::new()
            }
        };
        let skip = turns.len().saturating_sub(self.settings.history_window);
        turns.drain(..skip);
        turns
    }

    // ============ History ============

    pub async fn history(&self, session_id: &str) -> RagResult<Vec<ChatTurn>> {
        if session_id.trim().is_empty() {
            return Err(RagError::invalid("session_id must not be empty"));
        }
        self.memory
            .get_history(session_id)
            .await
            .map_err(RagError::Memory)
    }

    pub async fn clear_history(&self, session_id: &str) -> RagResult<()> {
        if session_id.trim().is_empty() {
            return Err(RagError::invalid("session_id must not be empty"));
        }
        self.bounded(Stage::MemoryWrite, self.memory.clear(session_id))
            .await
    }
}

/// Label each candidate with its document and score, in retrieval order.
pub fn build_context(candidates: &[RetrievedChunk]) -> String {
    candidates
        .iter()
        .map(|c| format!("[Doc {} | Score {:.3}]\n{}", c.document_id, c.score, c.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Instruction, context, prior turns, then the new question.
pub fn build_prompt(context: &str, history: &[ChatTurn], query: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 3);
    messages.push(ChatMessage::system(SYSTEM_PROMPT));
    messages.push(ChatMessage::system(format!("Context:\n{}", context)));
    messages.extend(history.iter().map(ChatMessage::from));
    messages.push(ChatMessage::user(query));
    messages
}
