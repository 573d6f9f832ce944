//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **AccountService**: Registration and password login
//! - **IdentityValidator**: Resolves bearer credentials to users
//! - **ChatService**: Direct and group chats, membership
//! - **MessageService**: Message history and deletion

pub mod auth_service;
pub mod chat_service;
pub mod message_service;

// Re-export auth service types
pub use auth_service::{
    AccountService, AccountServiceImpl, AuthError, AuthToken, Claims, IdentityValidator,
    JwtIdentityValidator, Registration,
};

// Re-export chat service types
pub use chat_service::{ChatError, ChatService, ChatServiceImpl, MembershipNotifier};

// Re-export message service types
pub use message_service::{
    MessageError, MessageQuery, MessageService, MessageServiceImpl, DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE,
};
