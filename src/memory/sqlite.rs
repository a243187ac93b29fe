//! SQLite-backed [`SessionMemory`].
//!
//! `chat_sessions` holds one row per live session with its expiry in unix
//! milliseconds. `chat_turns` holds the log, ordered by its autoincrement id.
//! Turn timestamps are stored as unix microseconds. Every append sweeps
//! all expired sessions, so logs nobody reads again do not accumulate.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::models::{ChatTurn, Role};

use super::{ensure_conversational, Retention, SessionMemory};

pub struct SqliteSessionMemory {
    pool: SqlitePool,
    retention: Retention,
}

impl SqliteSessionMemory {
    pub fn new(pool: SqlitePool, retention: Retention) -> Self {
        Self { pool, retention }
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[async_trait]
impl SessionMemory for SqliteSessionMemory {
    async fn append_turns(&self, session_id: &str, turns: &[ChatTurn]) -> Result<()> {
        ensure_conversational(turns)?;
        let now = now_millis();
        let mut tx = self.pool.begin().await?;

        // The first statement writes, so the transaction takes the write lock
        // up front and waits on busy_timeout instead of failing to upgrade a
        // read snapshot. It also reclaims every expired session, including
        // this one.
        sqlx::query(
            r#"
            DELETE FROM chat_turns
            WHERE session_id IN (SELECT session_id FROM chat_sessions WHERE expires_at <= ?)
            "#,
        )
        .bind(now)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM chat_sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(&mut *tx)
            .await?;

        for turn in turns {
            sqlx::query(
                "INSERT INTO chat_turns (session_id, role, content, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(session_id)
            .bind(turn.role.as_str())
            .bind(&turn.content)
            .bind(turn.timestamp.timestamp_micros())
            .execute(&mut *tx)
            .await?;
        }

        let ttl_ms = i64::try_from(self.retention.ttl.as_millis()).unwrap_or(i64::MAX);
        sqlx::query(
            r#"
            INSERT INTO chat_sessions (session_id, expires_at) VALUES (?, ?)
            ON CONFLICT(session_id) DO UPDATE SET expires_at = excluded.expires_at
            "#,
        )
        .bind(session_id)
        .bind(now.saturating_add(ttl_ms))
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM chat_turns
            WHERE session_id = ?
              AND id NOT IN (
                SELECT id FROM chat_turns
                WHERE session_id = ?
                ORDER BY id DESC
                LIMIT ?
              )
            "#,
        )
        .bind(session_id)
        .bind(session_id)
        .bind(self.retention.max_entries() as i64)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_history(&self, session_id: &str) -> Result<Vec<ChatTurn>> {
        let expires_at: Option<i64> =
            sqlx::query_scalar("SELECT expires_at FROM chat_sessions WHERE session_id = ?")
                .bind(session_id)
                .fetch_optional(&self.pool)
                .await?;
        match expires_at {
            Some(t) if t > now_millis() => {}
            _ => return Ok(Vec::new()),
        }

        let rows = sqlx::query(
            "SELECT role, content, created_at FROM chat_turns WHERE session_id = ? ORDER BY id ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<ChatTurn> {
                let role: String = row.get("role");
                let micros: i64 = row.get("created_at");
                let timestamp = DateTime::<Utc>::from_timestamp_micros(micros)
                    .ok_or_else(|| anyhow!("invalid turn timestamp: {}", micros))?;
                Ok(ChatTurn::at(
                    role.parse::<Role>()?,
                    row.get::<String, _>("content"),
                    timestamp,
                ))
            })
            .collect()
    }

    async fn clear(&self, session_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chat_turns WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM chat_sessions WHERE session_id = ?")
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
