//! Keyword-overlap extractive answers, used when no generation backend is
//! configured.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ChatMessage, Role};

use super::GenerationProvider;

/// Answer returned when no context sentence shares a keyword with the question.
pub const DONT_KNOW: &str = "I don't know from the provided context.";

/// Marker identifying the system message that carries retrieved context.
pub(crate) const CONTEXT_MARKER: &str = "Context:";

const MAX_ANSWER_CHARS: usize = 1200;
const MIN_KEYWORD_CHARS: usize = 4;

pub struct ExtractiveGenerator;

impl ExtractiveGenerator {
    pub fn answer(messages: &[ChatMessage]) -> String {
        let question = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();

        let keywords: Vec<String> = question
            .split_whitespace()
            .filter(|w| w.chars().count() >= MIN_KEYWORD_CHARS)
            .map(str::to_lowercase)
            .collect();

        let context = messages
            .iter()
            .filter(|m| m.role == Role::System && m.content.contains(CONTEXT_MARKER))
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let selected: Vec<&str> = context
            .split(". ")
            .filter(|sentence| {
                let lower = sentence.to_lowercase();
                keywords.iter().any(|k| lower.contains(k.as_str()))
            })
            .collect();

        if selected.is_empty() {
            return DONT_KNOW.to_string();
        }
        selected.join(". ").chars().take(MAX_ANSWER_CHARS).collect()
    }
}

#[async_trait]
impl GenerationProvider for ExtractiveGenerator {
    fn name(&self) -> &str {
        "local"
    }

    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        Ok(Self::answer(messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::SYSTEM_PROMPT;

    fn prompt(context: &str, question: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::system(format!("Context:\n{}", context)),
            ChatMessage::user(question),
        ]
    }

    #[test]
    fn test_selects_sentences_with_keywords() {
        let messages = prompt(
            "Tokio is an async runtime. Serde handles serialization. Tokio schedules tasks",
            "What does tokio do?",
        );
        let answer = ExtractiveGenerator::answer(&messages);
        assert_eq!(answer, "Context:\nTokio is an async runtime. Tokio schedules tasks");
    }

    #[test]
    fn test_short_words_are_not_keywords() {
        let messages = prompt("It is what it is. Nothing else", "is it");
        assert_eq!(ExtractiveGenerator::answer(&messages), DONT_KNOW);
    }

    #[test]
    fn test_no_context_means_dont_know() {
        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user("anything about deployments"),
        ];
        assert_eq!(ExtractiveGenerator::answer(&messages), DONT_KNOW);
    }

    #[test]
    fn test_uses_latest_user_message() {
        let mut messages = prompt("Apples are red. Bananas are yellow", "bananas");
        messages.insert(2, ChatMessage::user("apples"));
        let answer = ExtractiveGenerator::answer(&messages);
        assert_eq!(answer, "Bananas are yellow");
    }

    #[test]
    fn test_truncates_long_answers() {
        let context = "keyword ".repeat(400);
        let answer = ExtractiveGenerator::answer(&prompt(&context, "keyword"));
        assert_eq!(answer.chars().count(), 1200);
    }
}
