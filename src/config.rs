use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::{ChunkingParams, ChunkingStrategy, MAX_TOP_K, MIN_TOP_K};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub vector: VectorConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_strategy")]
    pub strategy: ChunkingStrategy,
    #[serde(default = "default_chunk_size")]
    pub size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

impl ChunkingConfig {
    pub fn params(&self) -> ChunkingParams {
        ChunkingParams {
            strategy: self.strategy,
            size: self.size,
            overlap: self.overlap,
        }
    }
}

fn default_strategy() -> ChunkingStrategy {
    ChunkingStrategy::Recursive
}
fn default_chunk_size() -> usize {
    500
}
fn default_overlap() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Most recent turns merged into each prompt.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            history_window: default_history_window(),
            max_query_chars: default_max_query_chars(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_history_window() -> usize {
    10
}
fn default_max_query_chars() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_embedding_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorConfig {
    #[serde(default = "default_sqlite_backend")]
    pub backend: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            backend: default_sqlite_backend(),
            collection: default_collection(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_sqlite_backend() -> String {
    "sqlite".to_string()
}
fn default_collection() -> String {
    "documents".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemoryConfig {
    #[serde(default = "default_sqlite_backend")]
    pub backend: String,
    /// User/assistant pairs retained per session.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_memory_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_sqlite_backend(),
            max_turns: default_max_turns(),
            ttl_secs: default_ttl_secs(),
            timeout_secs: default_memory_timeout_secs(),
        }
    }
}

fn default_max_turns() -> usize {
    15
}
fn default_ttl_secs() -> u64 {
    60 * 60 * 24
}
fn default_memory_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Environment variable holding the API key. Defaults per provider.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_app_title")]
    pub app_title: String,
    #[serde(default)]
    pub app_public_url: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: None,
            url: None,
            api_key_env: None,
            temperature: default_temperature(),
            timeout_secs: default_generation_timeout_secs(),
            app_title: default_app_title(),
            app_public_url: None,
        }
    }
}

fn default_generation_provider() -> String {
    "local".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_generation_timeout_secs() -> u64 {
    60
}
fn default_app_title() -> String {
    "ragdesk".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    config
        .chunking
        .params()
        .validate()
        .map_err(|e| anyhow::anyhow!("chunking: {}", e))?;

    // Validate retrieval
    if !(MIN_TOP_K..=MAX_TOP_K).contains(&config.retrieval.top_k) {
        anyhow::bail!(
            "retrieval.top_k must be between {} and {}",
            MIN_TOP_K,
            MAX_TOP_K
        );
    }
    if config.retrieval.max_query_chars == 0 {
        anyhow::bail!("retrieval.max_query_chars must be > 0");
    }
    // A prompt cannot replay more turns than a session retains.
    let retained = config.memory.max_turns.saturating_mul(2);
    if config.retrieval.history_window == 0 || config.retrieval.history_window > retained {
        anyhow::bail!(
            "retrieval.history_window must be between 1 and {} (2 * memory.max_turns)",
            retained.max(1)
        );
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "hash" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, hash, openai, ollama, or local.",
            other
        ),
    }
    if config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    // Validate stores
    for (key, backend) in [
        ("vector.backend", &config.vector.backend),
        ("memory.backend", &config.memory.backend),
    ] {
        if backend != "sqlite" && backend != "memory" {
            anyhow::bail!("{} must be 'sqlite' or 'memory', got '{}'", key, backend);
        }
    }
    if config.vector.collection.trim().is_empty() {
        anyhow::bail!("vector.collection must not be empty");
    }
    if config.memory.max_turns == 0 {
        anyhow::bail!("memory.max_turns must be >= 1");
    }
    if config.memory.ttl_secs == 0 {
        anyhow::bail!("memory.ttl_secs must be >= 1");
    }

    // Validate generation
    match config.generation.provider.as_str() {
        "local" | "openai" | "openrouter" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be local, openai, openrouter, or ollama.",
            other
        ),
    }
    if !(0.0..=2.0).contains(&config.generation.temperature) {
        anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
    }

    // Validate stage timeouts
    for (key, secs) in [
        ("embedding.timeout_secs", config.embedding.timeout_secs),
        ("vector.timeout_secs", config.vector.timeout_secs),
        ("memory.timeout_secs", config.memory.timeout_secs),
        ("generation.timeout_secs", config.generation.timeout_secs),
    ] {
        if secs == 0 {
            anyhow::bail!("{} must be >= 1", key);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config = parse("[db]\npath = \"./data/ragd.sqlite\"\n").unwrap();
        assert_eq!(config.chunking.strategy, ChunkingStrategy::Recursive);
        assert_eq!(config.chunking.size, 500);
        assert_eq!(config.chunking.overlap, 50);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.history_window, 10);
        assert_eq!(config.memory.max_turns, 15);
        assert_eq!(config.memory.ttl_secs, 86_400);
        assert_eq!(config.generation.provider, "local");
        assert!(!config.embedding.is_enabled());
        assert_eq!(config.server.bind, "127.0.0.1:8080");
    }

    #[test]
    fn test_rejects_out_of_range_chunk_size() {
        let err = parse("[db]\npath = \"x\"\n[chunking]\nsize = 10\noverlap = 0\n").unwrap_err();
        assert!(err.to_string().contains("size must be between"));
    }

    #[test]
    fn test_rejects_overlap_not_below_size() {
        let err =
            parse("[db]\npath = \"x\"\n[chunking]\nsize = 100\noverlap = 100\n").unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_rejects_unknown_strategy() {
        assert!(parse("[db]\npath = \"x\"\n[chunking]\nstrategy = \"semantic\"\n").is_err());
    }

    #[test]
    fn test_openai_embedding_requires_dims_and_model() {
        let err = parse("[db]\npath = \"x\"\n[embedding]\nprovider = \"openai\"\n").unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));

        let err = parse("[db]\npath = \"x\"\n[embedding]\nprovider = \"openai\"\ndims = 1536\n")
            .unwrap_err();
        assert!(err.to_string().contains("embedding.model"));
    }

    #[test]
    fn test_rejects_unknown_backends() {
        assert!(parse("[db]\npath = \"x\"\n[vector]\nbackend = \"qdrant\"\n").is_err());
        assert!(parse("[db]\npath = \"x\"\n[memory]\nbackend = \"redis\"\n").is_err());
        assert!(parse("[db]\npath = \"x\"\n[generation]\nprovider = \"gemini\"\n").is_err());
    }

    #[test]
    fn test_rejects_top_k_out_of_range() {
        assert!(parse("[db]\npath = \"x\"\n[retrieval]\ntop_k = 0\n").is_err());
        assert!(parse("[db]\npath = \"x\"\n[retrieval]\ntop_k = 11\n").is_err());
    }

    #[test]
    fn test_history_window_bounded_by_retention() {
        let err = parse("[db]\npath = \"x\"\n[retrieval]\nhistory_window = 500\n").unwrap_err();
        assert!(err.to_string().contains("retrieval.history_window"));
        assert!(parse("[db]\npath = \"x\"\n[retrieval]\nhistory_window = 0\n").is_err());

        let src = "[db]\npath = \"x\"\n[retrieval]\nhistory_window = 8\n[memory]\nmax_turns = 4\n";
        assert_eq!(parse(src).unwrap().retrieval.history_window, 8);
        let src = "[db]\npath = \"x\"\n[retrieval]\nhistory_window = 9\n[memory]\nmax_turns = 4\n";
        assert!(parse(src).is_err());
    }

    #[test]
    fn test_rejects_zero_stage_timeouts() {
        for section in ["embedding", "vector", "memory", "generation"] {
            let src = format!("[db]\npath = \"x\"\n[{}]\ntimeout_secs = 0\n", section);
            let err = parse(&src).unwrap_err();
            assert!(
                err.to_string().contains(&format!("{}.timeout_secs", section)),
                "unexpected error for {}: {}",
                section,
                err
            );
        }
    }

    #[test]
    fn test_load_config_reports_missing_file() {
        let err = load_config(Path::new("/nonexistent/ragd.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
