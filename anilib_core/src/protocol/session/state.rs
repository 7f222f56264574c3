//! Session state management
//!
//! Login lifecycle of the UDP session as an explicit state machine.

use serde::Serialize;
use std::fmt;

/// Login state of the session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session key held
    #[default]
    LoggedOut,
    /// AUTH sent, waiting for the reply
    LoggingIn,
    /// Session key valid as far as we know
    LoggedIn,
    /// The server rejected the session key; the next dispatch logs in again
    InvalidSession,
}

impl SessionState {
    pub fn is_logged_in(self) -> bool {
        matches!(self, SessionState::LoggedIn)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::LoggedOut => write!(f, "Logged out"),
            SessionState::LoggingIn => write!(f, "Logging in"),
            SessionState::LoggedIn => write!(f, "Logged in"),
            SessionState::InvalidSession => write!(f, "Invalid session"),
        }
    }
}

/// State transition validator
pub struct StateTransition {
    from: SessionState,
    to: SessionState,
}

impl StateTransition {
    pub fn new(from: SessionState, to: SessionState) -> Self {
        Self { from, to }
    }

    /// Check if the transition is valid according to the state machine rules
    pub fn is_valid(&self) -> bool {
        use SessionState::*;

        match (self.from, self.to) {
            // Logging out is always allowed and idempotent
            (_, LoggedOut) => true,

            (LoggedOut, LoggingIn) => true,
            (InvalidSession, LoggingIn) => true,

            (LoggingIn, LoggedIn) => true,

            (LoggedIn, InvalidSession) => true,

            _ => false,
        }
    }

    /// Get a description of why a transition might be invalid
    pub fn validation_error(&self) -> Option<String> {
        if self.is_valid() {
            None
        } else {
            Some(format!(
                "Invalid transition from {} to {}",
                self.from, self.to
            ))
        }
    }
}
