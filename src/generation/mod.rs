//! Answer generation backends.
//!
//! - [`OpenAiCompatibleGenerator`]: any `POST {base}/chat/completions`
//!   endpoint: OpenAI, OpenRouter, or Ollama's OpenAI-compatible API.
//! - [`ExtractiveGenerator`]: deterministic offline fallback that quotes
//!   context sentences mentioning the question's keywords.
//!
//! [`create_generator`] picks one from `[generation]`. The extractive
//! fallback is chosen only when no backend is configured (`provider =
//! "local"`, or a hosted provider without an API key), never as a stand-in
//! for a backend that failed.

mod extractive;

pub use extractive::{ExtractiveGenerator, DONT_KNOW};

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::config::GenerationConfig;
use crate::http;
use crate::models::ChatMessage;

/// Instruction placed first in every prompt.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant. Use only the provided context to answer. \
If the answer is not in the context, say you don't know.";

#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Backend name for logs (`"openai"`, `"local"`, ...).
    fn name(&self) -> &str;

    /// Produce an answer for an ordered prompt.
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Per-provider defaults: base URL, model, API key variable.
fn provider_defaults(provider: &str) -> (&'static str, &'static str, Option<&'static str>) {
    match provider {
        "openai" => ("https://api.openai.com/v1", "gpt-4o-mini", Some("OPENAI_API_KEY")),
        "openrouter" => (
            "https://openrouter.ai/api/v1",
            "openrouter/auto",
            Some("OPENROUTER_API_KEY"),
        ),
        _ => ("http://localhost:11434/v1", "llama3.2", None),
    }
}

pub struct OpenAiCompatibleGenerator {
    provider: String,
    model: String,
    endpoint: String,
    headers: Vec<(&'static str, String)>,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiCompatibleGenerator {
    /// Build a client for `config.provider`. `api_key` is sent as a bearer
    /// token when present.
    pub fn new(config: &GenerationConfig, api_key: Option<String>) -> Result<Self> {
        let (base_url, model, _) = provider_defaults(&config.provider);
        let base = config.url.as_deref().unwrap_or(base_url);

        let mut headers = Vec::new();
        if let Some(key) = api_key {
            headers.push(("Authorization", format!("Bearer {}", key)));
        }
        if config.provider == "openrouter" {
            if let Some(url) = &config.app_public_url {
                headers.push(("HTTP-Referer", url.clone()));
            }
            if !config.app_title.is_empty() {
                headers.push(("X-Title", config.app_title.clone()));
            }
        }

        Ok(Self {
            provider: config.provider.clone(),
            model: config.model.clone().unwrap_or_else(|| model.to_string()),
            endpoint: format!("{}/chat/completions", base.trim_end_matches('/')),
            headers,
            temperature: config.temperature,
            client: http::client(config.timeout_secs)?,
        })
    }

    fn request_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        })
    }
}

#[async_trait]
impl GenerationProvider for OpenAiCompatibleGenerator {
    fn name(&self) -> &str {
        &self.provider
    }

    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        // One attempt: the query pipeline never retries a stage.
        let json = http::post_json_with_retry(
            &self.client,
            &self.endpoint,
            &self.headers,
            &self.request_body(messages),
            0,
            &self.provider,
        )
        .await?;
        parse_chat_response(&json)
    }
}

/// Extract `choices[0].message.content`. A null content is an empty answer.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    let message = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| anyhow!("Invalid chat response: missing choices[0].message"))?;
    Ok(message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string())
}

/// Create the configured [`GenerationProvider`].
///
/// | `provider` | API key | Result |
/// |------------|---------|--------|
/// | `"local"` | n/a | [`ExtractiveGenerator`] |
/// | `"openai"` / `"openrouter"` | set | [`OpenAiCompatibleGenerator`] |
/// | `"openai"` / `"openrouter"` | missing | [`ExtractiveGenerator`], with a warning |
/// | `"ollama"` | optional | [`OpenAiCompatibleGenerator`] |
pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn GenerationProvider>> {
    let provider = config.provider.as_str();
    match provider {
        "local" => Ok(Arc::new(ExtractiveGenerator)),
        "openai" | "openrouter" | "ollama" => {
            let (_, _, default_env) = provider_defaults(provider);
            let key_env = config.api_key_env.as_deref().or(default_env);
            let api_key = key_env
                .and_then(|name| std::env::var(name).ok())
                .filter(|k| !k.trim().is_empty());

            if api_key.is_none() && provider != "ollama" {
                tracing::warn!(
                    provider,
                    key_env = key_env.unwrap_or_default(),
                    "no API key for generation backend; using local extractive answers"
                );
                return Ok(Arc::new(ExtractiveGenerator));
            }
            Ok(Arc::new(OpenAiCompatibleGenerator::new(config, api_key)?))
        }
        other => anyhow::bail!("Unknown generation provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str) -> GenerationConfig {
        GenerationConfig {
            provider: provider.to_string(),
            ..GenerationConfig::default()
        }
    }

    #[test]
    fn test_parse_chat_response() {
        let json = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "Paris." } }]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "Paris.");

        let null_content = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": null } }]
        });
        assert_eq!(parse_chat_response(&null_content).unwrap(), "");

        assert!(parse_chat_response(&serde_json::json!({ "choices": [] })).is_err());
    }

    #[test]
    fn test_openrouter_headers_and_endpoint() {
        let mut cfg = config("openrouter");
        cfg.app_public_url = Some("https://example.org".to_string());
        let generator = OpenAiCompatibleGenerator::new(&cfg, Some("sk-test".to_string())).unwrap();

        assert_eq!(generator.endpoint, "https://openrouter.ai/api/v1/chat/completions");
        assert_eq!(generator.model, "openrouter/auto");
        let names: Vec<&str> = generator.headers.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["Authorization", "HTTP-Referer", "X-Title"]);
    }

    #[test]
    fn test_request_body_carries_messages_in_order() {
        let generator = OpenAiCompatibleGenerator::new(&config("ollama"), None).unwrap();
        assert_eq!(generator.endpoint, "http://localhost:11434/v1/chat/completions");
        assert!(generator.headers.is_empty());

        let body = generator.request_body(&[
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user("hi"),
        ]);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert!((body["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_missing_key_selects_extractive_fallback() {
        let mut cfg = config("openai");
        cfg.api_key_env = Some("RAGDESK_TEST_KEY_THAT_IS_NEVER_SET".to_string());
        let generator = create_generator(&cfg).unwrap();
        assert_eq!(generator.name(), "local");

        assert_eq!(create_generator(&config("local")).unwrap().name(), "local");
        assert_eq!(create_generator(&config("ollama")).unwrap().name(), "ollama");
        assert!(create_generator(&config("gemini")).is_err());
    }
}
