//! Chat Service
//!
//! Creates direct and group chats, adds members and lists a user's chats.
//! Every membership change is forwarded to the live hub so connected
//! members start receiving messages immediately.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{Chat, ChatId, ChatRepository, ChatSummary, User, UserId, UserRepository};

/// Bridge to the live-messaging side.
#[async_trait]
pub trait MembershipNotifier: Send + Sync {
    /// The listed users are now members of the chat.
    async fn notify_membership_change(&self, chat_id: &ChatId, user_ids: &[UserId]);
}

/// Chat service trait
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Open the direct chat between the actor and another user.
    async fn create_direct_chat(&self, actor: UserId, other_username: &str) -> Result<Chat, ChatError>;

    /// Create a named group chat. The actor is always a member.
    async fn create_group_chat(
        &self,
        actor: UserId,
        name: &str,
        usernames: &[String],
    ) -> Result<Chat, ChatError>;

    /// Add a user to a group chat the actor belongs to.
    async fn add_member(&self, actor: UserId, chat_id: &ChatId, user_id: UserId) -> Result<(), ChatError>;

    /// Chats the user belongs to.
    async fn list_chats(&self, user_id: UserId) -> Result<Vec<ChatSummary>, ChatError>;
}

/// Chat service errors
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Chat not found")]
    ChatNotFound,

    #[error("Not a member of this chat")]
    Forbidden,

    #[error("Members can only be added to group chats")]
    NotAGroup,

    #[error("User is already a member")]
    AlreadyMember,

    #[error("Cannot open a direct chat with yourself")]
    SelfChat,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// ChatService implementation
pub struct ChatServiceImpl {
    users: Arc<dyn UserRepository>,
    chats: Arc<dyn ChatRepository>,
    notifier: Arc<dyn MembershipNotifier>,
}

impl ChatServiceImpl {
    pub fn new(
        users: Arc<dyn UserRepository>,
        chats: Arc<dyn ChatRepository>,
        notifier: Arc<dyn MembershipNotifier>,
    ) -> Self {
        Self {
            users,
            chats,
            notifier,
        }
    }

    async fn user_by_name(&self, username: &str) -> Result<User, ChatError> {
        self.users
            .find_by_username(username)
            .await
            .map_err(|e| ChatError::Internal(e.to_string()))?
            .ok_or_else(|| ChatError::UserNotFound(username.to_string()))
    }
}

#[async_trait]
impl ChatService for ChatServiceImpl {
    async fn create_direct_chat(&self, actor: UserId, other_username: &str) -> Result<Chat, ChatError> {
        let other = self.user_by_name(other_username).await?;
        if other.id == actor {
            return Err(ChatError::SelfChat);
        }

        let members = [actor, other.id];
        let chat = self
            .chats
            .create(&Chat::direct(actor, other.id), &members)
            .await
            .map_err(|e| ChatError::Internal(e.to_string()))?;

        self.notifier.notify_membership_change(&chat.id, &members).await;
        tracing::info!(chat_id = %chat.id, user_id = %actor, "Direct chat opened");

        Ok(chat)
    }

    async fn create_group_chat(
        &self,
        actor: UserId,
        name: &str,
        usernames: &[String],
    ) -> Result<Chat, ChatError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ChatError::InvalidRequest("group name is required".into()));
        }

        let mut seen = HashSet::from([actor]);
        let mut members = vec![actor];
        for username in usernames {
            let user = self.user_by_name(username).await?;
            if seen.insert(user.id) {
                members.push(user.id);
            }
        }
        if members.len() < 2 {
            return Err(ChatError::InvalidRequest(
                "a group needs at least one other member".into(),
            ));
        }

        let chat = self
            .chats
            .create(&Chat::group(name), &members)
            .await
            .map_err(|e| ChatError::Internal(e.to_string()))?;

        self.notifier.notify_membership_change(&chat.id, &members).await;
        tracing::info!(chat_id = %chat.id, members = members.len(), "Group chat created");

        Ok(chat)
    }

    async fn add_member(&self, actor: UserId, chat_id: &ChatId, user_id: UserId) -> Result<(), ChatError> {
        let chat = self
            .chats
            .find_by_id(chat_id)
            .await
            .map_err(|e| ChatError::Internal(e.to_string()))?
            .ok_or(ChatError::ChatNotFound)?;

        let is_member = self
            .chats
            .is_member(actor, chat_id)
            .await
            .map_err(|e| ChatError::Internal(e.to_string()))?;
        if !is_member {
            return Err(ChatError::Forbidden);
        }
        if !chat.is_group() {
            return Err(ChatError::NotAGroup);
        }

        self.users
            .find_by_id(user_id)
            .await
            .map_err(|e| ChatError::Internal(e.to_string()))?
            .ok_or_else(|| ChatError::UserNotFound(user_id.to_string()))?;

        let added = self
            .chats
            .add_member(chat_id, user_id)
            .await
            .map_err(|e| ChatError::Internal(e.to_string()))?;
        if !added {
            return Err(ChatError::AlreadyMember);
        }

        self.notifier.notify_membership_change(chat_id, &[user_id]).await;
        tracing::info!(chat_id = %chat_id, user_id = %user_id, "Member added");

        Ok(())
    }

    async fn list_chats(&self, user_id: UserId) -> Result<Vec<ChatSummary>, ChatError> {
        self.chats
            .find_by_user(user_id)
            .await
            .map_err(|e| ChatError::Internal(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Gender, MembershipStore};
    use crate::infrastructure::repositories::InMemoryStore;
    use chrono::{NaiveDate, Utc};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        calls: Mutex<Vec<(ChatId, Vec<UserId>)>>,
    }

    #[async_trait]
    impl MembershipNotifier for RecordingNotifier {
        async fn notify_membership_change(&self, chat_id: &ChatId, user_ids: &[UserId]) {
            self.calls.lock().push((chat_id.clone(), user_ids.to_vec()));
        }
    }

    struct Fixture {
        store: Arc<InMemoryStore>,
        notifier: Arc<RecordingNotifier>,
        service: ChatServiceImpl,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(InMemoryStore::new());
            let notifier = Arc::new(RecordingNotifier::default());
            let service = ChatServiceImpl::new(store.clone(), store.clone(), notifier.clone());
            Self {
                store,
                notifier,
                service,
            }
        }

        fn user(&self, username: &str) -> UserId {
            let user = User {
                id: UserId::new(),
                username: username.into(),
                first_name: username.into(),
                last_name: "Test".into(),
                gender: Gender::NonBinary,
                date_of_birth: NaiveDate::from_ymd_opt(1995, 3, 14).unwrap(),
                created_at: Utc::now(),
            };
            let id = user.id;
            self.store.insert_user(user);
            id
        }
    }

    #[tokio::test]
    async fn test_direct_chat_is_idempotent_and_notifies() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        let bob = fx.user("bob");

        let first = fx.service.create_direct_chat(alice, "bob").await.unwrap();
        let again = fx.service.create_direct_chat(bob, "alice").await.unwrap();

        assert_eq!(first.id, again.id);
        assert_eq!(fx.service.list_chats(alice).await.unwrap().len(), 1);
        assert_eq!(fx.notifier.calls.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_direct_chat_with_self_is_rejected() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        assert!(matches!(
            fx.service.create_direct_chat(alice, "alice").await,
            Err(ChatError::SelfChat)
        ));
    }

    #[tokio::test]
    async fn test_group_includes_creator_and_needs_others() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        let bob = fx.user("bob");

        assert!(matches!(
            fx.service.create_group_chat(alice, "solo", &["alice".into()]).await,
            Err(ChatError::InvalidRequest(_))
        ));

        let chat = fx
            .service
            .create_group_chat(alice, "team", &["bob".into(), "bob".into()])
            .await
            .unwrap();
        assert!(fx.store.is_member(alice, &chat.id).await.unwrap());
        assert!(fx.store.is_member(bob, &chat.id).await.unwrap());

        let calls = fx.notifier.calls.lock();
        assert_eq!(calls.last().unwrap().1, vec![alice, bob]);
    }

    #[tokio::test]
    async fn test_add_member_rules() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        let bob = fx.user("bob");
        let carol = fx.user("carol");
        let group = fx
            .service
            .create_group_chat(alice, "team", &["bob".into()])
            .await
            .unwrap();
        let direct = fx.service.create_direct_chat(alice, "bob").await.unwrap();

        assert!(matches!(
            fx.service.add_member(carol, &group.id, carol).await,
            Err(ChatError::Forbidden)
        ));
        assert!(matches!(
            fx.service.add_member(alice, &direct.id, carol).await,
            Err(ChatError::NotAGroup)
        ));
        assert!(matches!(
            fx.service.add_member(alice, &group.id, bob).await,
            Err(ChatError::AlreadyMember)
        ));
        assert!(matches!(
            fx.service.add_member(alice, &ChatId::new("missing"), carol).await,
            Err(ChatError::ChatNotFound)
        ));

        fx.service.add_member(bob, &group.id, carol).await.unwrap();
        assert!(fx.store.is_member(carol, &group.id).await.unwrap());
        assert_eq!(fx.notifier.calls.lock().last().unwrap().1, vec![carol]);
    }

    #[tokio::test]
    async fn test_unknown_username() {
        let fx = Fixture::new();
        let alice = fx.user("alice");
        assert!(matches!(
            fx.service.create_direct_chat(alice, "nobody").await,
            Err(ChatError::UserNotFound(name)) if name == "nobody"
        ));
    }
}
