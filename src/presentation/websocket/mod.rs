//! WebSocket Hub
//!
//! Live messaging over persistent connections: the registry of connected
//! users and their chat subscriptions, the delivery pipeline, and the hub
//! that coordinates them.

pub mod connection;
pub mod error;
pub mod handler;
pub mod hub;
pub mod messages;
pub mod pipeline;
pub mod registry;
pub mod session;

pub use connection::{run_session, ConnectionHandle, ConnectionId, Outbox};
pub use error::{CapacityError, DeliveryError, TransportError};
pub use handler::ws_handler;
pub use hub::Hub;
pub use messages::{ClientFrame, ServerFrame};
pub use pipeline::{Delivery, DeliveryPipeline, FanOutReport};
pub use registry::Registry;
pub use session::{IllegalTransition, SessionState};
