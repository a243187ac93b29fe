//! Bounded, expiring conversation memory.
//!
//! Each session owns an ordered log of [`ChatTurn`]s. Every append is one
//! atomic unit that pushes the new turns onto the tail, refreshes the
//! session's time-to-live, and trims the log to the newest
//! `2 * max_turns` entries. A session whose TTL has lapsed reads as empty.
//!
//! Implementations:
//!
//! - [`sqlite::SqliteSessionMemory`]: `chat_sessions` / `chat_turns` tables,
//!   one transaction per append.
//! - [`in_memory::InMemorySessionMemory`]: a `HashMap` behind a mutex.

pub mod in_memory;
pub mod sqlite;

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::MemoryConfig;
use crate::models::{ChatTurn, Role};

/// Retention policy shared by every backend.
#[derive(Debug, Clone, Copy)]
pub struct Retention {
    /// User/assistant pairs kept per session.
    pub max_turns: usize,
    pub ttl: Duration,
}

impl Retention {
    pub fn max_entries(&self) -> usize {
        self.max_turns * 2
    }
}

impl From<&MemoryConfig> for Retention {
    fn from(config: &MemoryConfig) -> Self {
        Self {
            max_turns: config.max_turns,
            ttl: Duration::from_secs(config.ttl_secs),
        }
    }
}

#[async_trait]
pub trait SessionMemory: Send + Sync {
    /// Append `turns` in order, refresh the TTL, and trim, as one unit.
    async fn append_turns(&self, session_id: &str, turns: &[ChatTurn]) -> Result<()>;

    /// Turns currently retained, oldest first. Unknown or expired sessions
    /// yield an empty list.
    async fn get_history(&self, session_id: &str) -> Result<Vec<ChatTurn>>;

    async fn clear(&self, session_id: &str) -> Result<()>;

    async fn append_turn(&self, session_id: &str, role: Role, content: &str) -> Result<()> {
        self.append_turns(session_id, &[ChatTurn::new(role, content)])
            .await
    }
}

/// History holds only the conversation itself. System instructions are
/// rebuilt for every prompt and never stored.
pub(crate) fn ensure_conversational(turns: &[ChatTurn]) -> Result<()> {
    if let Some(turn) = turns.iter().find(|t| t.role == Role::System) {
        bail!(
            "session history accepts user and assistant turns only, got {}",
            turn.role.as_str()
        );
    }
    Ok(())
}

/// A user turn and its answer, stamped so the answer sorts strictly after
/// the question even when the clock has not advanced.
pub fn exchange(question: &str, answer: &str) -> [ChatTurn; 2] {
    let asked_at = Utc::now();
    let answered_at = later_than(asked_at, Utc::now());
    [
        ChatTurn::at(Role::User, question, asked_at),
        ChatTurn::at(Role::Assistant, answer, answered_at),
    ]
}

fn later_than(prev: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let floor = prev + chrono::Duration::milliseconds(1);
    if now > floor {
        now
    } else {
        floor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_orders_roles_and_timestamps() {
        let [user, assistant] = exchange("what is rust?", "a language");
        assert_eq!(user.role, Role::User);
        assert_eq!(assistant.role, Role::Assistant);
        assert!(assistant.timestamp > user.timestamp);
    }

    #[test]
    fn test_later_than_keeps_clock_when_ahead() {
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(2);
        assert_eq!(later_than(t0, t1), t1);
        assert_eq!(later_than(t0, t0), t0 + chrono::Duration::milliseconds(1));
    }

    #[test]
    fn test_ensure_conversational() {
        assert!(ensure_conversational(&exchange("q", "a")).is_ok());
        assert!(ensure_conversational(&[]).is_ok());
        let err = ensure_conversational(&[ChatTurn::new(Role::System, "rules")]).unwrap_err();
        assert!(err.to_string().contains("system"));
    }

    #[test]
    fn test_retention_from_config() {
        let r = Retention::from(&MemoryConfig::default());
        assert_eq!(r.max_turns, 15);
        assert_eq!(r.max_entries(), 30);
        assert_eq!(r.ttl, Duration::from_secs(86_400));
    }
}
