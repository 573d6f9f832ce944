//! # Domain Layer
//!
//! The domain layer contains the core business types of the chat backend.
//! It is independent of any external frameworks or infrastructure concerns.
//!
//! ## Structure
//!
//! - **entities**: Core domain entities (User, Chat, Message)
//! - **value_objects**: Immutable value types (UserId, ChatId)
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Repository traits define data access contracts
//! - Closed enumerations for small domains (chat type, gender)

pub mod entities;
pub mod value_objects;

// Re-export commonly used types
pub use entities::*;
pub use value_objects::*;
