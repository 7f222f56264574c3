//! Error types for the anilib core library
//!
//! Errors are organized into categories so the queue layer can decide between
//! retrying, pausing and dropping a command by looking at the category alone.

use thiserror::Error;

pub mod internal;
pub mod io;
pub mod validation;

pub use self::io::{IoError, IoErrorKind};
pub use self::validation::ValidationError;
pub use crate::protocol::error::ProtocolError;
pub use internal::InternalError;

use crate::protocol::Axis;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the anilib core library
///
/// Errors are categorized into four main types:
/// - I/O errors: file system operations (image downloads, hashing input)
/// - Protocol errors: registry session, ban and transport failures
/// - Validation errors: configuration and input validation
/// - Internal errors: command store, payloads and handler failures
#[derive(Error, Debug)]
pub enum Error {
    /// I/O related errors
    #[error(transparent)]
    Io(#[from] IoError),

    /// Protocol related errors
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Validation related errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Internal library errors
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl Error {
    /// Whether retrying the same operation may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Protocol(err) => err.is_transient(),
            _ => false,
        }
    }

    /// The axis a ban or backoff refused this operation on
    pub fn blocked_axis(&self) -> Option<Axis> {
        match self {
            Self::Protocol(err) => err.blocked_axis(),
            _ => None,
        }
    }

    /// Whether an operator has to change settings before this can succeed
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Protocol(err) => err.is_configuration(),
            Self::Validation(ValidationError::InvalidConfiguration { .. }) => true,
            _ => false,
        }
    }

    /// Create a handler failure error
    pub fn handler(command_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Internal(InternalError::handler(command_type, message))
    }
}

// Conversions from external error types

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io(IoError::from_std(source))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(InternalError::serialization(err.to_string()))
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(InternalError::store(format!("Database error: {err}")))
    }
}
