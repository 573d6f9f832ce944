//! Integration Tests Entry Point
//!
//! Tests are organized by module:
//! - `api/` - REST API endpoint tests
//! - `hub/` - Live delivery scenarios against the hub
//! - `common/` - Shared test utilities

mod api;
mod common;
mod hub;
