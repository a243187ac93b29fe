//! `ragd ingest`: index local files.
//!
//! Each file goes through the same path as an HTTP upload: extension check,
//! text extraction, chunking, one batched embedding call, vector upsert, and
//! a single row transaction. Chunking parameters default to `[chunking]` and
//! can be overridden per run.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::app;
use crate::config::Config;
use crate::models::{ChunkingParams, ChunkingStrategy};

pub async fn run_ingest(
    config: &Config,
    paths: &[PathBuf],
    strategy: Option<String>,
    size: Option<usize>,
    overlap: Option<usize>,
) -> Result<()> {
    let defaults = config.chunking.params();
    let params = ChunkingParams {
        strategy: match strategy {
            Some(s) => s.parse::<ChunkingStrategy>()?,
            None => defaults.strategy,
        },
        size: size.unwrap_or(defaults.size),
        overlap: overlap.unwrap_or(defaults.overlap),
    };
    params.validate()?;

    let pipeline = app::build_pipeline(config).await?;

    let mut total_chunks = 0;
    for path in paths {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let outcome = pipeline
            .ingest_bytes(bytes, &filename, None, params)
            .await
            .with_context(|| format!("Failed to ingest {}", path.display()))?;

        println!("ingest {}", path.display());
        println!("  document: {}", outcome.document_id);
        println!("  chunks: {}", outcome.num_chunks);
        total_chunks += outcome.num_chunks;
    }

    if paths.len() > 1 {
        println!("total: {} files, {} chunks", paths.len(), total_chunks);
    }
    println!("ok");
    Ok(())
}
