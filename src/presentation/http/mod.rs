//! HTTP Surface
//!
//! Chat management routes, health probes and the metrics endpoint.

pub mod extractors;
pub mod handlers;
pub mod routes;

pub use extractors::AuthUser;
pub use routes::create_router;
