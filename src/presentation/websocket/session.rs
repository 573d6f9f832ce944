//! WebSocket Session Lifecycle

use std::fmt;

/// Lifecycle of one hub session.
///
/// `Connecting -> Active -> Closing -> Closed`. A session may also go from
/// `Connecting` straight to `Closing` when it is superseded before it was
/// fully subscribed. Nothing leaves `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Connecting,
    Active,
    Closing,
    Closed,
}

/// Rejected state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal session transition {from} -> {to}")]
pub struct IllegalTransition {
    pub from: SessionState,
    pub to: SessionState,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, Active) | (Connecting, Closing) | (Active, Closing) | (Closing, Closed)
        )
    }

    /// Move to `next`, or report why not.
    pub fn transition(&mut self, next: SessionState) -> Result<(), IllegalTransition> {
        if self.can_transition_to(next) {
            *self = next;
            Ok(())
        } else {
            Err(IllegalTransition { from: *self, to: next })
        }
    }

    pub fn is_terminal(self) -> bool {
        self == SessionState::Closed
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
