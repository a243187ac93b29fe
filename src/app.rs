//! Process-wide wiring.
//!
//! [`build_pipeline`] constructs every long-lived collaborator exactly once
//! from the configuration: the SQLite pool, chunk store, embedding provider,
//! vector index, session memory, and generator. The CLI commands and the
//! HTTP server share the resulting [`RagPipeline`]; the server also gets a
//! [`BookingStore`] over the same pool through [`build_services`].

use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;

use crate::booking::BookingStore;
use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::generation;
use crate::memory::{in_memory::InMemorySessionMemory, sqlite::SqliteSessionMemory, Retention, SessionMemory};
use crate::migrate;
use crate::pipeline::{PipelineSettings, RagPipeline};
use crate::store::sqlite::SqliteChunkStore;
use crate::vector::{memory::InMemoryVectorIndex, sqlite::SqliteVectorIndex, VectorIndex};

/// Everything the HTTP server serves.
pub struct Services {
    pub pipeline: RagPipeline,
    pub bookings: BookingStore,
}

pub async fn build_services(config: &Config) -> Result<Services> {
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;

    Ok(Services {
        bookings: BookingStore::new(pool.clone()),
        pipeline: pipeline_over(config, pool)?,
    })
}

pub async fn build_pipeline(config: &Config) -> Result<RagPipeline> {
    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;
    pipeline_over(config, pool)
}

fn pipeline_over(config: &Config, pool: SqlitePool) -> Result<RagPipeline> {
    let embedder = embedding::create_provider(&config.embedding)?;

    let index: Arc<dyn VectorIndex> = match config.vector.backend.as_str() {
        "memory" => Arc::new(InMemoryVectorIndex::new()),
        _ => Arc::new(SqliteVectorIndex::new(
            pool.clone(),
            config.vector.collection.clone(),
        )),
    };

    let retention = Retention::from(&config.memory);
    let memory: Arc<dyn SessionMemory> = match config.memory.backend.as_str() {
        "memory" => Arc::new(InMemorySessionMemory::new(retention)),
        _ => Arc::new(SqliteSessionMemory::new(pool.clone(), retention)),
    };

    let generator = generation::create_generator(&config.generation)?;

    tracing::info!(
        db = %config.db.path.display(),
        embedding = embedder.model_name(),
        dims = embedder.dims(),
        vector_backend = %config.vector.backend,
        collection = %config.vector.collection,
        memory_backend = %config.memory.backend,
        generator = generator.name(),
        "pipeline ready"
    );

    Ok(RagPipeline::new(
        Arc::new(SqliteChunkStore::new(pool)),
        embedder,
        index,
        memory,
        generator,
        PipelineSettings::from(config),
    ))
}
