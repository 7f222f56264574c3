//! Internal library error types

use thiserror::Error;

/// Internal library errors
#[derive(Error, Debug)]
pub enum InternalError {
    /// Command store failure
    #[error("Command store error: {message}")]
    Store { message: String },

    /// Payload (de)serialization failure
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Payload written by an incompatible version
    #[error("Unsupported payload version {found} (expected {expected})")]
    UnsupportedPayloadVersion { found: u32, expected: u32 },

    /// No handler registered for a command type
    #[error("No handler registered for command type '{command_type}'")]
    HandlerNotRegistered { command_type: String },

    /// Handler business logic failure
    #[error("Handler '{command_type}' failed: {message}")]
    Handler {
        command_type: String,
        message: String,
    },

    /// Internal assertion failure
    #[error("Internal assertion failed: {message}")]
    Assertion { message: String },
}

impl InternalError {
    /// Create a command store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn unsupported_payload_version(found: u32, expected: u32) -> Self {
        Self::UnsupportedPayloadVersion { found, expected }
    }

    pub fn handler_not_registered(command_type: impl Into<String>) -> Self {
        Self::HandlerNotRegistered {
            command_type: command_type.into(),
        }
    }

    /// Create a handler failure error
    pub fn handler(command_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            command_type: command_type.into(),
            message: message.into(),
        }
    }

    /// Create an internal assertion failure error
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion {
            message: message.into(),
        }
    }
}
