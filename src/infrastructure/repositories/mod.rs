//! Repository Implementations
//!
//! Concrete implementations of the repository traits defined in the domain
//! layer.
//!
//! ## Available Repositories
//!
//! - **PgUserRepository** - Read-only user account access
//! - **PgChatRepository** - Chats and memberships; the hub's membership store
//! - **PgMessageRepository** - Message persistence with cursor pagination
//! - **InMemoryStore** - All of the above, process-local
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use sqlx::PgPool;
//! use crate::infrastructure::repositories::{
//!     PgChatRepository, PgMessageRepository, PgUserRepository,
//! };
//!
//! async fn setup_repositories(pool: PgPool) {
//!     let users = PgUserRepository::new(pool.clone());
//!     let chats = PgChatRepository::new(pool.clone());
//!     let messages = PgMessageRepository::new(pool);
//! }
//! ```

pub mod chat_repository;
pub mod memory;
pub mod message_repository;
pub mod user_repository;

pub use chat_repository::PgChatRepository;
pub use memory::InMemoryStore;
pub use message_repository::PgMessageRepository;
pub use user_repository::PgUserRepository;
