//! WebSocket Frame Types
//!
//! JSON frames exchanged over `/ws`, shaped as `{"t": "<TYPE>", "d": {...}}`.

use serde::{Deserialize, Serialize};

use crate::domain::{ChatId, Message};

/// Frames sent by clients.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "t", content = "d", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientFrame {
    /// Submit a message. Any sender field the client adds is ignored.
    SendMessage {
        chat_id: ChatId,
        content: String,
        /// Echoed back in the matching ack or error
        #[serde(default, skip_serializing_if = "Option::is_none")]
        nonce: Option<String>,
    },
    Heartbeat,
}

/// Frames sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "d", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerFrame {
    /// A message another member posted
    MessageCreate(Message),
    /// The sender's own submission was persisted
    MessageAck {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        nonce: Option<String>,
        message: Message,
    },
    Error {
        code: String,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        nonce: Option<String>,
    },
    HeartbeatAck,
}

impl ServerFrame {
    pub fn error(code: impl Into<String>, message: impl Into<String>, nonce: Option<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
            nonce,
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            Self::MessageCreate(_) => "MESSAGE_CREATE",
            Self::MessageAck { .. } => "MESSAGE_ACK",
            Self::Error { .. } => "ERROR",
            Self::HeartbeatAck => "HEARTBEAT_ACK",
        }
    }
}
