//! Chat Repository Implementation
//!
//! PostgreSQL implementation of chats and chat memberships. Also serves as
//! the hub's membership store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Chat, ChatId, ChatRepository, ChatSummary, ChatType, MembershipStore, UserId};
use crate::shared::error::AppError;

/// PostgreSQL chat repository implementation.
#[derive(Clone)]
pub struct PgChatRepository {
    pool: PgPool,
}

impl PgChatRepository {
    /// Create a new PgChatRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ChatRow {
    id: String,
    name: String,
    chat_type: i16,
    created_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl ChatRow {
    fn into_chat(self) -> Result<Chat, AppError> {
        let chat_type = ChatType::from_code(self.chat_type).ok_or_else(|| {
            AppError::Internal(format!("Unknown chat type code {} for {}", self.chat_type, self.id))
        })?;

        Ok(Chat {
            id: ChatId::new(self.id),
            name: self.name,
            chat_type,
            created_at: self.created_at,
            deleted_at: self.deleted_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ChatSummaryRow {
    id: String,
    name: String,
    chat_type: i16,
}

#[async_trait]
impl MembershipStore for PgChatRepository {
    async fn chats_of(&self, user_id: UserId) -> Result<Vec<ChatId>, AppError> {
        let ids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT cm.chat_id
            FROM chat_members cm
            JOIN chats c ON c.id = cm.chat_id
            WHERE cm.user_id = $1 AND cm.left_at IS NULL AND c.deleted_at IS NULL
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(ChatId::new).collect())
    }

    async fn is_member(&self, user_id: UserId, chat_id: &ChatId) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM chat_members
                WHERE chat_id = $1 AND user_id = $2 AND left_at IS NULL
            )
            "#,
        )
        .bind(chat_id.as_str())
        .bind(user_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}

#[async_trait]
impl ChatRepository for PgChatRepository {
    async fn find_by_id(&self, chat_id: &ChatId) -> Result<Option<Chat>, AppError> {
        let row = sqlx::query_as::<_, ChatRow>(
            r#"
            SELECT id, name, chat_type, created_at, deleted_at
            FROM chats
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(chat_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(ChatRow::into_chat).transpose()
    }

    async fn create(&self, chat: &Chat, members: &[UserId]) -> Result<Chat, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO chats (id, name, chat_type, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(chat.id.as_str())
        .bind(&chat.name)
        .bind(chat.chat_type.code())
        .bind(chat.created_at)
        .execute(&mut *tx)
        .await?;

        let member_ids: Vec<Uuid> = members.iter().map(UserId::as_uuid).collect();
        sqlx::query(
            r#"
            INSERT INTO chat_members (chat_id, user_id)
            SELECT $1, UNNEST($2::uuid[])
            ON CONFLICT (chat_id, user_id) DO NOTHING
            "#,
        )
        .bind(chat.id.as_str())
        .bind(&member_ids)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, ChatRow>(
            r#"
            SELECT id, name, chat_type, created_at, deleted_at
            FROM chats
            WHERE id = $1
            "#,
        )
        .bind(chat.id.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        row.into_chat()
    }

    async fn add_member(&self, chat_id: &ChatId, user_id: UserId) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO chat_members (chat_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (chat_id, user_id) DO UPDATE
                SET left_at = NULL, joined_at = NOW()
                WHERE chat_members.left_at IS NOT NULL
            "#,
        )
        .bind(chat_id.as_str())
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<ChatSummary>, AppError> {
        let rows = sqlx::query_as::<_, ChatSummaryRow>(
            r#"
            SELECT c.id, c.name, c.chat_type
            FROM chats c
            JOIN chat_members cm ON cm.chat_id = c.id
            WHERE cm.user_id = $1 AND cm.left_at IS NULL AND c.deleted_at IS NULL
            ORDER BY c.created_at DESC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                let chat_type = ChatType::from_code(r.chat_type).ok_or_else(|| {
                    AppError::Internal(format!("Unknown chat type code {} for {}", r.chat_type, r.id))
                })?;
                Ok(ChatSummary {
                    chat_id: ChatId::new(r.id),
                    name: r.name,
                    chat_type,
                })
            })
            .collect()
    }
}
