//! Message Service
//!
//! Message history and deletion. Sending goes through the hub so that HTTP
//! and WebSocket senders share one delivery path.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{ChatId, MembershipStore, Message, MessageRepository, UserId};

/// Default page size for history queries
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Largest page a client may ask for
pub const MAX_PAGE_SIZE: i64 = 100;

/// Message service trait
#[async_trait]
pub trait MessageService: Send + Sync {
    /// Get messages from a chat, newest first
    async fn get_messages(
        &self,
        actor: UserId,
        chat_id: &ChatId,
        query: MessageQuery,
    ) -> Result<Vec<Message>, MessageError>;

    /// Soft-delete one of the actor's own messages
    async fn delete_message(&self, actor: UserId, message_id: i64) -> Result<(), MessageError>;
}

/// Message query parameters
#[derive(Debug, Clone, Default)]
pub struct MessageQuery {
    pub before: Option<i64>,
    pub limit: Option<i64>,
}

impl MessageQuery {
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }
}

/// Message service errors
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Message not found")]
    NotFound,

    #[error("Permission denied")]
    Forbidden,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// MessageService implementation
pub struct MessageServiceImpl {
    messages: Arc<dyn MessageRepository>,
    membership: Arc<dyn MembershipStore>,
}

impl MessageServiceImpl {
    pub fn new(messages: Arc<dyn MessageRepository>, membership: Arc<dyn MembershipStore>) -> Self {
        Self {
            messages,
            membership,
        }
    }
}

#[async_trait]
impl MessageService for MessageServiceImpl {
    async fn get_messages(
        &self,
        actor: UserId,
        chat_id: &ChatId,
        query: MessageQuery,
    ) -> Result<Vec<Message>, MessageError> {
        let is_member = self
            .membership
            .is_member(actor, chat_id)
            .await
            .map_err(|e| MessageError::Internal(e.to_string()))?;
        if !is_member {
            return Err(MessageError::Forbidden);
        }

        self.messages
            .find_by_chat(chat_id, query.before, query.effective_limit())
            .await
            .map_err(|e| MessageError::Internal(e.to_string()))
    }

    async fn delete_message(&self, actor: UserId, message_id: i64) -> Result<(), MessageError> {
        let message = self
            .messages
            .find_by_id(message_id)
            .await
            .map_err(|e| MessageError::Internal(e.to_string()))?
            .filter(|m| !m.is_deleted())
            .ok_or(MessageError::NotFound)?;

        // Only the sender can delete
        if message.sender_id != actor {
            return Err(MessageError::Forbidden);
        }

        let deleted = self
            .messages
            .soft_delete(message_id)
            .await
            .map_err(|e| MessageError::Internal(e.to_string()))?;
        if !deleted {
            return Err(MessageError::NotFound);
        }

        tracing::info!(message_id, user_id = %actor, "Message deleted");
        Ok(())
    }
}
