//! In-process [`SessionMemory`]. Nothing survives a restart. Expired
//! sessions are swept on every append.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Instant;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::ChatTurn;

use super::{ensure_conversational, Retention, SessionMemory};

struct Session {
    turns: VecDeque<ChatTurn>,
    expires_at: Instant,
}

pub struct InMemorySessionMemory {
    retention: Retention,
    sessions: Mutex<HashMap<String, Session>>,
}

impl InMemorySessionMemory {
    pub fn new(retention: Retention) -> Self {
        Self {
            retention,
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("session memory lock poisoned")
}

#[async_trait]
impl SessionMemory for InMemorySessionMemory {
    async fn append_turns(&self, session_id: &str, turns: &[ChatTurn]) -> Result<()> {
        ensure_conversational(turns)?;
        let now = Instant::now();
        let mut sessions = self.sessions.lock().map_err(poisoned)?;

        // Drop every lapsed session, not just this one, so abandoned ids
        // do not pile up.
        sessions.retain(|_, s| s.expires_at > now);

        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session {
                turns: VecDeque::new(),
                expires_at: now,
            });

        session.turns.extend(turns.iter().cloned());
        session.expires_at = now + self.retention.ttl;
        let max = self.retention.max_entries();
        while session.turns.len() > max {
            session.turns.pop_front();
        }
        Ok(())
    }

    async fn get_history(&self, session_id: &str) -> Result<Vec<ChatTurn>> {
        let mut sessions = self.sessions.lock().map_err(poisoned)?;
        let expired = match sessions.get(session_id) {
            None => return Ok(Vec::new()),
            Some(s) => s.expires_at <= Instant::now(),
        };
        if expired {
            sessions.remove(session_id);
            return Ok(Vec::new());
        }
        Ok(sessions
            .get(session_id)
            .map(|s| s.turns.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn clear(&self, session_id: &str) -> Result<()> {
        self.sessions.lock().map_err(poisoned)?.remove(session_id);
        Ok(())
    }
}
