//! Chat entity, membership and repository traits.
//!
//! Maps to the `chats` and `chat_members` tables in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::value_objects::{ChatId, UserId};
use crate::shared::error::AppError;

/// Chat kind stored as a SMALLINT code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    /// Two-party chat with a derived identifier
    Direct,
    /// Named chat with any number of members
    Group,
}

impl ChatType {
    pub fn code(&self) -> i16 {
        match self {
            Self::Direct => 0,
            Self::Group => 1,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            0 => Some(Self::Direct),
            1 => Some(Self::Group),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
        }
    }
}

impl std::fmt::Display for ChatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Represents a chat.
///
/// Maps to the `chats` table:
/// - id: TEXT PRIMARY KEY
/// - name: VARCHAR(100) NOT NULL (empty for direct chats)
/// - chat_type: SMALLINT NOT NULL
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// - deleted_at: TIMESTAMPTZ NULL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub name: String,
    pub chat_type: ChatType,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Chat {
    /// A direct chat between two users. The id is derived from the pair.
    pub fn direct(a: UserId, b: UserId) -> Self {
        Self {
            id: ChatId::direct(a, b),
            name: String::new(),
            chat_type: ChatType::Direct,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    /// A new group chat with a freshly generated id.
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            id: ChatId::group(),
            name: name.into(),
            chat_type: ChatType::Group,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    pub fn is_group(&self) -> bool {
        self.chat_type == ChatType::Group
    }
}

/// A user's membership in a chat (`chat_members` row).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMember {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
}

/// Chat id and display name, as listed for one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatSummary {
    pub chat_id: ChatId,
    pub name: String,
    pub chat_type: ChatType,
}

/// Read-only membership contract consumed by the hub.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Every chat the user currently belongs to.
    async fn chats_of(&self, user_id: UserId) -> Result<Vec<ChatId>, AppError>;

    /// Whether the user is a current member of the chat.
    async fn is_member(&self, user_id: UserId, chat_id: &ChatId) -> Result<bool, AppError>;
}

/// Chat management data access.
#[async_trait]
pub trait ChatRepository: MembershipStore {
    async fn find_by_id(&self, chat_id: &ChatId) -> Result<Option<Chat>, AppError>;

    /// Create a chat with its initial members.
    ///
    /// Creating a chat whose id already exists is not an error: the existing
    /// row is kept and missing members are added. Direct chats rely on this.
    async fn create(&self, chat: &Chat, members: &[UserId]) -> Result<Chat, AppError>;

    /// Add one member. Returns `false` when the user already was a member.
    async fn add_member(&self, chat_id: &ChatId, user_id: UserId) -> Result<bool, AppError>;

    /// List the user's chats.
    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<ChatSummary>, AppError>;
}
