//! Message entity and repository traits.
//!
//! Maps to the `messages` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{ChatId, UserId};
use crate::shared::error::AppError;

/// Represents a persisted message.
///
/// Maps to the `messages` table:
/// - id: BIGSERIAL PRIMARY KEY (assigned by the store, monotonic)
/// - chat_id: TEXT NOT NULL REFERENCES chats(id)
/// - sender_id: UUID NOT NULL REFERENCES users(id)
/// - content: TEXT NOT NULL
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// - deleted_at: TIMESTAMPTZ NULL (soft delete)
///
/// Messages are never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub chat_id: ChatId,
    pub sender_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Get the content length in characters.
    pub fn content_length(&self) -> usize {
        self.content.chars().count()
    }
}

/// A submission before persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDraft {
    pub chat_id: ChatId,
    pub sender_id: UserId,
    pub content: String,
}

impl MessageDraft {
    pub fn new(chat_id: ChatId, sender_id: UserId, content: impl Into<String>) -> Self {
        Self {
            chat_id,
            sender_id,
            content: content.into(),
        }
    }
}

/// Write contract consumed by the delivery pipeline.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a draft. The store assigns `id` and `created_at`.
    async fn persist(&self, draft: &MessageDraft) -> Result<Message, AppError>;
}

/// Message history and soft delete.
#[async_trait]
pub trait MessageRepository: MessageStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError>;

    /// Messages of a chat, newest first, excluding soft-deleted ones.
    ///
    /// - `before`: only messages with an id lower than this one
    /// - `limit`: maximum number of messages to return
    async fn find_by_chat(
        &self,
        chat_id: &ChatId,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Message>, AppError>;

    /// Mark a message deleted. Returns `false` if it was missing or already deleted.
    async fn soft_delete(&self, id: i64) -> Result<bool, AppError>;
}
