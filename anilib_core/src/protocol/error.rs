//! Protocol-specific error types
//!
//! Every failure the registry client can report is classified here, so callers
//! match on a variant instead of inspecting raw response codes.

use crate::protocol::ban::Axis;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Protocol-specific error types
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Network I/O error
    #[error("Network I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No response within the request timeout
    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    /// HTTP transport failure
    #[error("HTTP request failed: {message}")]
    Http { message: String, transient: bool },

    /// The axis is banned by the registry
    #[error("{axis} access is banned: {reason}")]
    Banned { axis: Axis, reason: String },

    /// The axis is paused by a temporary backoff
    #[error("{axis} access is backing off for {remaining:?}: {reason}")]
    Backoff {
        axis: Axis,
        remaining: Duration,
        reason: String,
    },

    /// The registry rejected the session token
    #[error("Session is invalid or expired")]
    InvalidSession,

    /// Dispatch was attempted without a session
    #[error("Not logged in to the registry")]
    NotLoggedIn,

    /// The registry rejected the credentials
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    /// Username or password is not configured
    #[error("Registry credentials are not configured")]
    MissingCredentials,

    /// The registry refuses this client build (outdated or banned client)
    #[error("Client rejected by registry: {code} - {message}")]
    ClientRejected { code: u16, message: String },

    /// Registry server error
    #[error("Registry server error: {code} - {message}")]
    ServerError { code: u16, message: String },

    /// Invalid packet format
    #[error("Invalid packet format: {message}")]
    InvalidPacket { message: String },

    /// Decoding error
    #[error("Decoding error: {message}")]
    Decoding { message: String },

    /// Packet too large
    #[error("Packet size {size} exceeds maximum {max_size}")]
    PacketTooLarge { size: usize, max_size: usize },

    /// Missing required field
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// Invalid response format
    #[error("Invalid response format: expected {expected}, got {actual}")]
    InvalidResponse { expected: String, actual: String },

    /// The session is shutting down
    #[error("Registry session is shutting down")]
    ShuttingDown,
}

impl ProtocolError {
    /// Create an invalid packet error
    pub fn invalid_packet(message: impl Into<String>) -> Self {
        Self::InvalidPacket {
            message: message.into(),
        }
    }

    /// Create a decoding error
    pub fn decoding(message: impl Into<String>) -> Self {
        Self::Decoding {
            message: message.into(),
        }
    }

    /// Create a packet too large error
    pub fn packet_too_large(size: usize, max_size: usize) -> Self {
        Self::PacketTooLarge { size, max_size }
    }

    /// Create a ban error
    pub fn banned(axis: Axis, reason: impl Into<String>) -> Self {
        Self::Banned {
            axis,
            reason: reason.into(),
        }
    }

    /// Create a backoff error
    pub fn backoff(axis: Axis, remaining: Duration, reason: impl Into<String>) -> Self {
        Self::Backoff {
            axis,
            remaining,
            reason: reason.into(),
        }
    }

    /// Create a server error
    pub fn server_error(code: u16, message: impl Into<String>) -> Self {
        Self::ServerError {
            code,
            message: message.into(),
        }
    }

    /// Create an authentication failed error
    pub fn authentication_failed(reason: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            reason: reason.into(),
        }
    }

    pub fn client_rejected(code: u16, message: impl Into<String>) -> Self {
        Self::ClientRejected {
            code,
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Create an invalid response error
    pub fn invalid_response(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::InvalidResponse {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an HTTP error
    pub fn http(message: impl Into<String>, transient: bool) -> Self {
        Self::Http {
            message: message.into(),
            transient,
        }
    }

    /// Check if this error is transient and can be retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::Timeout(_)
                | Self::InvalidSession
                | Self::NotLoggedIn
                | Self::Http {
                    transient: true,
                    ..
                }
        )
    }

    /// Check if this error indicates a need to re-authenticate
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            Self::InvalidSession
                | Self::NotLoggedIn
                | Self::ServerError {
                    code: 501 | 506,
                    ..
                }
        )
    }

    /// The axis this error blocks, if the request was refused by a ban or backoff
    pub fn blocked_axis(&self) -> Option<Axis> {
        match self {
            Self::Banned { axis, .. } | Self::Backoff { axis, .. } => Some(*axis),
            // A rejected login starts a UDP cooldown
            Self::AuthenticationFailed { .. } => Some(Axis::Udp),
            _ => None,
        }
    }

    /// Check if this error needs an operator to fix configuration
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingCredentials | Self::ClientRejected { .. }
        )
    }
}

impl From<reqwest::Error> for ProtocolError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout(crate::protocol::HTTP_TIMEOUT);
        }
        let transient = err.is_connect() || err.is_request() || err.is_body();
        Self::Http {
            message: err.to_string(),
            transient,
        }
    }
}

/// Response code returned by the registry's UDP interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseCode(pub u16);

impl ResponseCode {
    pub const LOGIN_ACCEPTED: Self = Self(200);
    pub const LOGIN_ACCEPTED_NEW_VERSION: Self = Self(201);
    pub const LOGGED_OUT: Self = Self(203);
    pub const PONG: Self = Self(300);
    pub const LOGIN_FAILED: Self = Self(500);
    pub const LOGIN_FIRST: Self = Self(501);
    pub const CLIENT_VERSION_OUTDATED: Self = Self(503);
    pub const CLIENT_BANNED: Self = Self(504);
    pub const ILLEGAL_INPUT: Self = Self(505);
    pub const INVALID_SESSION: Self = Self(506);
    pub const BANNED: Self = Self(555);
    pub const UNKNOWN_COMMAND: Self = Self(598);

    /// Check if the response code indicates success
    pub fn is_success(&self) -> bool {
        matches!(self.0, 200..=299)
    }

    /// "No such ..." and "already ..." informational codes
    pub fn is_informational(&self) -> bool {
        matches!(self.0, 300..=399)
    }

    /// Check if the response code indicates an error
    pub fn is_error(&self) -> bool {
        self.0 >= 500
    }

    /// Codes that mean the registry is overloaded and asks for a delay
    pub fn is_server_trouble(&self) -> bool {
        matches!(self.0, 600 | 601 | 602 | 604)
    }

    /// Get a human-readable description of the response code
    pub fn description(&self) -> &'static str {
        match self.0 {
            200 => "LOGIN ACCEPTED",
            201 => "LOGIN ACCEPTED - NEW VERSION AVAILABLE",
            203 => "LOGGED OUT",
            210 => "MYLIST ENTRY ADDED",
            211 => "MYLIST ENTRY DELETED",
            220 => "FILE",
            240 => "EPISODE",
            250 => "GROUP",
            260 => "VOTED",
            261 => "VOTE UPDATED",
            297 => "CALENDAR",
            243 => "UPDATED",

            300 => "PONG",
            310 => "FILE ALREADY IN MYLIST",
            311 => "MYLIST ENTRY EDITED",
            320 => "NO SUCH FILE",
            330 => "NO SUCH ANIME",
            340 => "NO SUCH EPISODE",
            350 => "NO SUCH GROUP",
            321 => "NO SUCH ENTRY",
            343 => "NO UPDATES",
            394 => "NO CALENDAR ENTRIES",

            500 => "LOGIN FAILED",
            501 => "LOGIN FIRST",
            502 => "ACCESS DENIED",
            503 => "CLIENT VERSION OUTDATED",
            504 => "CLIENT BANNED",
            505 => "ILLEGAL INPUT OR ACCESS DENIED",
            506 => "INVALID SESSION",
            555 => "BANNED",
            598 => "UNKNOWN COMMAND",
            600 => "INTERNAL SERVER ERROR",
            601 => "OUT OF SERVICE",
            602 => "SERVER BUSY",
            604 => "TIMEOUT - DELAY AND RESUBMIT",

            _ => "UNKNOWN RESPONSE CODE",
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.0, self.description())
    }
}
