//! # Domain Entities
//!
//! Core domain entities representing the main business objects of the chat
//! backend. All entities map directly to their corresponding database tables.
//!
//! - **User**: account read by chat management and the WebSocket upgrade
//! - **Chat**: a direct or group chat and its memberships
//! - **Message**: a persisted chat message
//!
//! ## Repository Traits
//!
//! Each entity has an associated repository trait defining data access
//! operations. `MembershipStore` and `MessageStore` are the narrow contracts
//! the hub consumes; the wider `ChatRepository` and `MessageRepository` extend
//! them for chat management. Implementations live in the infrastructure layer.

mod user;
mod chat;
mod message;

pub use user::{Credentials, Gender, User, UserRepository};

pub use chat::{Chat, ChatMember, ChatRepository, ChatSummary, ChatType, MembershipStore};

pub use message::{Message, MessageDraft, MessageRepository, MessageStore};
