//! Validation related error types

use thiserror::Error;

/// Validation and configuration errors
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// Invalid input parameter
    #[error("Invalid parameter '{parameter}': {reason}")]
    InvalidParameter { parameter: String, reason: String },

    /// Missing required field
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// Unknown command type tag
    #[error("Unknown command type: {tag}")]
    UnknownCommandType { tag: String },

    /// Unknown queue name
    #[error("Unknown queue: {name}")]
    UnknownQueue { name: String },
}

impl ValidationError {
    /// Create an invalid configuration error
    pub fn invalid_configuration(message: &str) -> Self {
        Self::InvalidConfiguration {
            message: message.to_string(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: &str, reason: &str) -> Self {
        Self::InvalidParameter {
            parameter: parameter.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: &str) -> Self {
        Self::MissingField {
            field: field.to_string(),
        }
    }

    pub fn unknown_command_type(tag: &str) -> Self {
        Self::UnknownCommandType {
            tag: tag.to_string(),
        }
    }

    pub fn unknown_queue(name: &str) -> Self {
        Self::UnknownQueue {
            name: name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_configuration_error() {
        let error = ValidationError::invalid_configuration("Bad config");
        assert!(error.to_string().contains("Invalid configuration"));
        assert!(error.to_string().contains("Bad config"));
    }

    #[test]
    fn test_invalid_parameter_error() {
        let error = ValidationError::invalid_parameter("vote", "must be between 100 and 1000");
        assert!(error.to_string().contains("'vote'"));
        assert!(error.to_string().contains("between 100 and 1000"));
    }

    #[test]
    fn test_missing_field_error() {
        let error = ValidationError::missing_field("registry.username");
        assert!(error.to_string().contains("registry.username"));
    }

    #[test]
    fn test_unknown_tags() {
        assert!(
            ValidationError::unknown_command_type("Frobnicate")
                .to_string()
                .contains("Frobnicate")
        );
        assert!(
            ValidationError::unknown_queue("video")
                .to_string()
                .contains("video")
        );
    }
}
