//! Hub error taxonomy.

use thiserror::Error;

use crate::shared::error::AppError;

/// A submission was refused. Nothing was persisted or delivered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("message content is empty")]
    EmptyContent,

    #[error("message content exceeds {max} characters")]
    ContentTooLong { max: usize },

    #[error("sender is not a member of this chat")]
    NotAMember,

    #[error("message could not be persisted: {0}")]
    Persistence(String),
}

impl DeliveryError {
    /// Machine-readable code sent in `ERROR` frames.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyContent => "EMPTY_CONTENT",
            Self::ContentTooLong { .. } => "CONTENT_TOO_LONG",
            Self::NotAMember => "NOT_A_MEMBER",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }

    /// Label used for the submissions counter.
    pub(crate) fn outcome(&self) -> &'static str {
        match self {
            Self::EmptyContent | Self::ContentTooLong { .. } => "rejected",
            Self::NotAMember => "not_a_member",
            Self::Persistence(_) => "persistence_failed",
        }
    }
}

impl From<DeliveryError> for AppError {
    fn from(err: DeliveryError) -> Self {
        match err {
            DeliveryError::EmptyContent | DeliveryError::ContentTooLong { .. } => {
                AppError::Validation(err.to_string())
            }
            DeliveryError::NotAMember => AppError::Forbidden(err.to_string()),
            DeliveryError::Persistence(_) => AppError::Unavailable(err.to_string()),
        }
    }
}

/// Connection-level failure. Ends that one session.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("read failed: {0}")]
    Read(String),

    #[error("write failed: {0}")]
    Write(String),

    #[error("protocol violation: {0}")]
    Protocol(&'static str),

    #[error("undecodable frame: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("idle for longer than {0:?}")]
    IdleTimeout(std::time::Duration),
}

/// One subscriber's outbound queue refused a frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapacityError {
    #[error("outbound queue is full")]
    Full,

    #[error("connection is closed")]
    Closed,
}
