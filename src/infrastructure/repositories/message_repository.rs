//! Message Repository Implementation
//!
//! PostgreSQL implementation of message persistence with cursor-based
//! history and soft delete.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::domain::{ChatId, Message, MessageDraft, MessageRepository, MessageStore, UserId};
use crate::shared::error::AppError;

/// PostgreSQL message repository implementation.
///
/// Message ids come from the `messages.id` BIGSERIAL sequence, which keeps
/// them monotonic per database.
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
    /// Server-side bound on the insert. `None` leaves the session default.
    statement_timeout: Option<Duration>,
}

impl PgMessageRepository {
    /// Creates a new PgMessageRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            statement_timeout: None,
        }
    }

    /// Have the server cancel inserts that run longer than `timeout`. A
    /// cancelled insert is rolled back, so a timed out write never commits.
    pub fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }
}

fn set_statement_timeout(timeout: Duration) -> String {
    // integer values are milliseconds; zero would disable the limit
    format!("SET LOCAL statement_timeout = {}", timeout.as_millis().max(1))
}

/// Internal row type for message queries.
#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i64,
    chat_id: String,
    sender_id: Uuid,
    content: String,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl MessageRow {
    /// Converts database row to domain Message entity.
    fn into_message(self) -> Message {
        Message {
            id: self.id,
            chat_id: ChatId::new(self.chat_id),
            sender_id: UserId(self.sender_id),
            content: self.content,
            created_at: self.created_at,
            deleted_at: self.deleted_at,
        }
    }
}

#[async_trait]
impl MessageStore for PgMessageRepository {
    async fn persist(&self, draft: &MessageDraft) -> Result<Message, AppError> {
        let started = Instant::now();
        let mut tx = self.pool.begin().await?;

        if let Some(timeout) = self.statement_timeout {
            sqlx::query(&set_statement_timeout(timeout))
                .execute(&mut *tx)
                .await?;
        }

        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO messages (chat_id, sender_id, content)
            VALUES ($1, $2, $3)
            RETURNING id, chat_id, sender_id, content, created_at, deleted_at
            "#,
        )
        .bind(draft.chat_id.as_str())
        .bind(draft.sender_id.as_uuid())
        .bind(&draft.content)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::trace!(
            message_id = row.id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Message row inserted"
        );

        Ok(row.into_message())
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, chat_id, sender_id, content, created_at, deleted_at
            FROM messages
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_message()))
    }

    /// Uses keyset pagination on the message id, newest first.
    async fn find_by_chat(
        &self,
        chat_id: &ChatId,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Message>, AppError> {
        let rows = match before {
            Some(before_id) => {
                sqlx::query_as::<_, MessageRow>(
                    r#"
                    SELECT id, chat_id, sender_id, content, created_at, deleted_at
                    FROM messages
                    WHERE chat_id = $1 AND id < $2 AND deleted_at IS NULL
                    ORDER BY id DESC
                    LIMIT $3
                    "#,
                )
                .bind(chat_id.as_str())
                .bind(before_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, MessageRow>(
                    r#"
                    SELECT id, chat_id, sender_id, content, created_at, deleted_at
                    FROM messages
                    WHERE chat_id = $1 AND deleted_at IS NULL
                    ORDER BY id DESC
                    LIMIT $2
                    "#,
                )
                .bind(chat_id.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.into_iter().map(|r| r.into_message()).collect())
    }

    async fn soft_delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET deleted_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
