//! # Chat Hub
//!
//! A chat backend built around a live fan-out hub:
//! - WebSocket sessions that receive every message posted to their chats
//! - A delivery pipeline that validates, persists and fans out submissions
//! - RESTful endpoints for chats, membership and history
//! - PostgreSQL storage, or an in-memory store when no database is configured
//!
//! ## Architecture
//!
//! - **Domain Layer**: Users, chats, messages and the storage traits
//! - **Application Layer**: Identity validation, chat and message services
//! - **Infrastructure Layer**: Database pool, repositories, metrics
//! - **Presentation Layer**: HTTP handlers and the WebSocket hub
//!
//! ## Module Structure
//!
//! ```text
//! chat_hub/
//! +-- config/         Configuration management
//! +-- domain/         Entities, identifiers and repository traits
//! +-- application/    Services and DTOs
//! +-- infrastructure/ PostgreSQL and in-memory repositories, metrics
//! +-- presentation/   HTTP routes, middleware and the hub
//! +-- shared/         Errors and validation helpers
//! ```

// Configuration module
pub mod config;

// Domain layer
pub mod domain;

// Application layer
pub mod application;

// Infrastructure layer
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Logging
pub mod telemetry;
