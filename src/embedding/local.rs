//! Local sentence-transformer inference via fastembed.
//!
//! Models are downloaded on first use from Hugging Face and cached. After
//! the initial download no network calls are made. The loaded model is kept
//! for the life of the provider and inference runs on the blocking pool.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::config::EmbeddingConfig;

use super::EmbeddingProvider;

pub struct LocalProvider {
    model_name: String,
    dims: usize,
    batch_size: usize,
    model: Arc<Mutex<Option<fastembed::TextEmbedding>>>,
}

/// Supported models: config name, fastembed variant, output width.
const MODELS: &[(&str, fastembed::EmbeddingModel, usize)] = &[
    ("all-minilm-l6-v2", fastembed::EmbeddingModel::AllMiniLML6V2, 384),
    ("bge-small-en-v1.5", fastembed::EmbeddingModel::BGESmallENV15, 384),
    ("bge-base-en-v1.5", fastembed::EmbeddingModel::BGEBaseENV15, 768),
    ("bge-large-en-v1.5", fastembed::EmbeddingModel::BGELargeENV15, 1024),
    ("nomic-embed-text-v1", fastembed::EmbeddingModel::NomicEmbedTextV1, 768),
    ("nomic-embed-text-v1.5", fastembed::EmbeddingModel::NomicEmbedTextV15, 768),
    ("multilingual-e5-small", fastembed::EmbeddingModel::MultilingualE5Small, 384),
    ("multilingual-e5-base", fastembed::EmbeddingModel::MultilingualE5Base, 768),
    ("multilingual-e5-large", fastembed::EmbeddingModel::MultilingualE5Large, 1024),
];

const DEFAULT_MODEL: &str = "all-minilm-l6-v2";

fn lookup(name: &str) -> Result<(fastembed::EmbeddingModel, usize)> {
    match MODELS.iter().find(|(n, _, _)| *n == name) {
        Some((_, model, dims)) => Ok((model.clone(), *dims)),
        None => {
            let known: Vec<&str> = MODELS.iter().map(|(n, _, _)| *n).collect();
            bail!(
                "Unknown local embedding model: '{}'. Supported models: {}",
                name,
                known.join(", ")
            )
        }
    }
}

impl LocalProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let (_, native_dims) = lookup(&model_name)?;

        Ok(Self {
            model_name,
            dims: config.dims.unwrap_or(native_dims),
            batch_size: config.batch_size,
            model: Arc::new(Mutex::new(None)),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = Arc::clone(&self.model);
        let model_name = self.model_name.clone();
        let batch_size = self.batch_size;
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut guard = model
                .lock()
                .map_err(|_| anyhow!("local embedding model lock poisoned"))?;
            if guard.is_none() {
                tracing::info!(model = %model_name, "loading local embedding model");
                let loaded = fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(lookup(&model_name)?.0)
                        .with_show_download_progress(false),
                )
                .map_err(|e| anyhow!("Failed to initialize local embedding model: {}", e))?;
                *guard = Some(loaded);
            }
            let model = guard
                .as_mut()
                .ok_or_else(|| anyhow!("local embedding model not loaded"))?;

            model
                .embed(texts, Some(batch_size))
                .map_err(|e| anyhow!("Local embedding failed: {}", e))
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dims_follow_model() {
        let mut config = EmbeddingConfig {
            provider: "local".to_string(),
            model: Some("bge-base-en-v1.5".to_string()),
            ..EmbeddingConfig::default()
        };
        assert_eq!(LocalProvider::new(&config).unwrap().dims(), 768);

        config.model = None;
        let provider = LocalProvider::new(&config).unwrap();
        assert_eq!(provider.model_name(), DEFAULT_MODEL);
        assert_eq!(provider.dims(), 384);
    }

    #[test]
    fn test_unknown_model_rejected() {
        let config = EmbeddingConfig {
            provider: "local".to_string(),
            model: Some("gpt-embed-9000".to_string()),
            ..EmbeddingConfig::default()
        };
        let err = LocalProvider::new(&config).err().unwrap();
        assert!(err.to_string().contains("bge-small-en-v1.5"));
    }
}
