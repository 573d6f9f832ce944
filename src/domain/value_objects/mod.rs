//! # Domain Value Objects
//!
//! Immutable value types that represent domain concepts without identity.
//!
//! - **UserId**: account UUID
//! - **ChatId**: opaque chat id, derived for direct chats

mod ids;

pub use ids::*;
