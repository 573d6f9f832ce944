//! In-Memory Store
//!
//! A process-local implementation of every repository trait. Used when no
//! database URL is configured and by the test suites. `set_available(false)`
//! makes every call fail as if the database were unreachable.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::domain::{
    Chat, ChatId, ChatMember, ChatRepository, ChatSummary, Credentials, MembershipStore, Message,
    MessageDraft, MessageRepository, MessageStore, User, UserId, UserRepository,
};
use crate::shared::error::AppError;

#[derive(Default)]
struct State {
    users: HashMap<UserId, User>,
    password_hashes: HashMap<UserId, String>,
    chats: HashMap<ChatId, Chat>,
    members: HashMap<ChatId, HashMap<UserId, ChatMember>>,
    messages: BTreeMap<i64, Message>,
    next_message_id: i64,
}

/// In-memory implementation of the user, chat and message repositories.
pub struct InMemoryStore {
    state: Mutex<State>,
    available: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Toggle simulated availability.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Insert a user that has no password and so cannot log in.
    pub fn insert_user(&self, user: User) {
        self.state.lock().users.insert(user.id, user);
    }

    /// Number of persisted messages, deleted ones included.
    pub fn message_count(&self) -> usize {
        self.state.lock().messages.len()
    }

    /// Every persisted message of a chat in id order.
    pub fn messages_in(&self, chat_id: &ChatId) -> Vec<Message> {
        self.state
            .lock()
            .messages
            .values()
            .filter(|m| &m.chat_id == chat_id)
            .cloned()
            .collect()
    }

    fn ensure_available(&self) -> Result<(), AppError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AppError::Unavailable("in-memory store is offline".into()))
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn is_active_member(state: &State, user_id: UserId, chat_id: &ChatId) -> bool {
    state
        .members
        .get(chat_id)
        .and_then(|m| m.get(&user_id))
        .is_some_and(|m| m.left_at.is_none())
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, AppError> {
        self.ensure_available()?;
        Ok(self.state.lock().users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        self.ensure_available()?;
        Ok(self
            .state
            .lock()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create_account(&self, user: &User, _email: &str, password_hash: &str) -> Result<User, AppError> {
        self.ensure_available()?;
        let mut state = self.state.lock();
        if state.users.values().any(|u| u.username == user.username) {
            return Err(AppError::Conflict("Username already exists".into()));
        }

        state.users.insert(user.id, user.clone());
        state.password_hashes.insert(user.id, password_hash.to_string());
        Ok(user.clone())
    }

    async fn find_credentials(&self, username: &str) -> Result<Option<Credentials>, AppError> {
        self.ensure_available()?;
        let state = self.state.lock();
        let credentials = state
            .users
            .values()
            .find(|u| u.username == username)
            .and_then(|user| {
                state.password_hashes.get(&user.id).map(|hash| Credentials {
                    user: user.clone(),
                    password_hash: hash.clone(),
                })
            });
        Ok(credentials)
    }
}

#[async_trait]
impl MembershipStore for InMemoryStore {
    async fn chats_of(&self, user_id: UserId) -> Result<Vec<ChatId>, AppError> {
        self.ensure_available()?;
        let state = self.state.lock();
        Ok(state
            .members
            .keys()
            .filter(|chat_id| is_active_member(&state, user_id, chat_id))
            .cloned()
            .collect())
    }

    async fn is_member(&self, user_id: UserId, chat_id: &ChatId) -> Result<bool, AppError> {
        self.ensure_available()?;
        Ok(is_active_member(&self.state.lock(), user_id, chat_id))
    }
}

#[async_trait]
impl ChatRepository for InMemoryStore {
    async fn find_by_id(&self, chat_id: &ChatId) -> Result<Option<Chat>, AppError> {
        self.ensure_available()?;
        Ok(self
            .state
            .lock()
            .chats
            .get(chat_id)
            .filter(|c| c.deleted_at.is_none())
            .cloned())
    }

    async fn create(&self, chat: &Chat, members: &[UserId]) -> Result<Chat, AppError> {
        self.ensure_available()?;
        let mut state = self.state.lock();
        let stored = state
            .chats
            .entry(chat.id.clone())
            .or_insert_with(|| chat.clone())
            .clone();

        let now = Utc::now();
        let entry = state.members.entry(chat.id.clone()).or_default();
        for &user_id in members {
            entry.entry(user_id).or_insert_with(|| ChatMember {
                chat_id: chat.id.clone(),
                user_id,
                joined_at: now,
                left_at: None,
            });
        }

        Ok(stored)
    }

    async fn add_member(&self, chat_id: &ChatId, user_id: UserId) -> Result<bool, AppError> {
        self.ensure_available()?;
        let mut state = self.state.lock();
        if !state.chats.contains_key(chat_id) {
            return Err(AppError::NotFound(format!("chat {chat_id}")));
        }

        let members = state.members.entry(chat_id.clone()).or_default();
        match members.get_mut(&user_id) {
            Some(member) if member.left_at.is_none() => Ok(false),
            Some(member) => {
                member.left_at = None;
                member.joined_at = Utc::now();
                Ok(true)
            }
            None => {
                members.insert(
                    user_id,
                    ChatMember {
                        chat_id: chat_id.clone(),
                        user_id,
                        joined_at: Utc::now(),
                        left_at: None,
                    },
                );
                Ok(true)
            }
        }
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<ChatSummary>, AppError> {
        self.ensure_available()?;
        let state = self.state.lock();
        let mut chats: Vec<&Chat> = state
            .chats
            .values()
            .filter(|c| c.deleted_at.is_none() && is_active_member(&state, user_id, &c.id))
            .collect();
        chats.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(chats
            .into_iter()
            .map(|c| ChatSummary {
                chat_id: c.id.clone(),
                name: c.name.clone(),
                chat_type: c.chat_type,
            })
            .collect())
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn persist(&self, draft: &MessageDraft) -> Result<Message, AppError> {
        self.ensure_available()?;
        let mut state = self.state.lock();
        if !state.chats.contains_key(&draft.chat_id) {
            return Err(AppError::NotFound(format!("chat {}", draft.chat_id)));
        }

        state.next_message_id += 1;
        let message = Message {
            id: state.next_message_id,
            chat_id: draft.chat_id.clone(),
            sender_id: draft.sender_id,
            content: draft.content.clone(),
            created_at: Utc::now(),
            deleted_at: None,
        };
        state.messages.insert(message.id, message.clone());

        Ok(message)
    }
}

#[async_trait]
impl MessageRepository for InMemoryStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError> {
        self.ensure_available()?;
        Ok(self.state.lock().messages.get(&id).cloned())
    }

    async fn find_by_chat(
        &self,
        chat_id: &ChatId,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Message>, AppError> {
        self.ensure_available()?;
        let upper = before.unwrap_or(i64::MAX);
        Ok(self
            .state
            .lock()
            .messages
            .range(..upper)
            .rev()
            .map(|(_, m)| m)
            .filter(|m| &m.chat_id == chat_id && !m.is_deleted())
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn soft_delete(&self, id: i64) -> Result<bool, AppError> {
        self.ensure_available()?;
        let mut state = self.state.lock();
        match state.messages.get_mut(&id) {
            Some(message) if message.deleted_at.is_none() => {
                message.deleted_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
