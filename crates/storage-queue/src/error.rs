//! Error types for queue operations.

use std::time::Duration;
use thiserror::Error;

/// Comprehensive error type for all queue operations
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] ValidationError),

    #[error("Queue not found: {queue_name}. {message}")]
    QueueNotFound { queue_name: String, message: String },

    #[error("Message not found or receipt expired: {message_id}")]
    MessageNotFound { message_id: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Provider error ({provider}): {status} {code} - {message}")]
    Provider {
        provider: String,
        code: String,
        status: u16,
        message: String,
    },

    #[error("Serialization failed: {0}")]
    Serialization(#[from] SerializationError),
}

impl QueueError {
    /// Create the error raised when a queue is missing and auto-create is disabled
    pub fn queue_not_found(queue_name: &str) -> Self {
        Self::QueueNotFound {
            queue_name: queue_name.to_string(),
            message: format!(
                "The queue '{}' does not exist and the service is not configured to create missing queues. Enable auto_create_queues to have missing queues created.",
                queue_name
            ),
        }
    }

    /// Check if error is transient and a retry might succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Configuration(_) => false,
            Self::InvalidArgument(_) => false,
            Self::QueueNotFound { .. } => false,
            Self::MessageNotFound { .. } => false,
            Self::Timeout { .. } => true,
            Self::ConnectionFailed { .. } => true,
            Self::AuthenticationFailed { .. } => false,
            Self::Provider { status, .. } => *status >= 500 || *status == 429,
            Self::Serialization(_) => false,
        }
    }

    /// Check if the error came from a backend round trip rather than from
    /// local validation
    pub fn is_operation_error(&self) -> bool {
        !matches!(
            self,
            Self::Configuration(_) | Self::InvalidArgument(_) | Self::QueueNotFound { .. }
        )
    }
}

/// Errors during message serialization/deserialization
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Document nesting depth {depth} exceeds the maximum of {max_depth}")]
    DepthExceeded { depth: usize, max_depth: usize },

    #[error("Message body is not valid UTF-8")]
    InvalidUtf8,

    #[error("Message body is not valid base64: {message}")]
    InvalidBase64 { message: String },

    #[error("Malformed service response: {message}")]
    MalformedResponse { message: String },
}

/// Configuration errors, raised when the service is constructed
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Invalid configuration for {key}: {message}")]
    Invalid { key: String, message: String },

    #[error("Configuration parsing failed: {message}")]
    Parsing { message: String },
}

impl ConfigurationError {
    /// Name of the configuration field the error refers to, if any
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Missing { key } | Self::Invalid { key, .. } => Some(key),
            Self::Parsing { .. } => None,
        }
    }
}

impl From<config::ConfigError> for ConfigurationError {
    fn from(error: config::ConfigError) -> Self {
        Self::Parsing {
            message: error.to_string(),
        }
    }
}

/// Argument validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required field missing or blank: {field}")]
    Required { field: String },

    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },
}

impl ValidationError {
    /// Name of the argument that failed validation
    pub fn field(&self) -> &str {
        match self {
            Self::Required { field } | Self::InvalidFormat { field, .. } => field,
        }
    }
}

/// Reject empty or whitespace-only values
pub(crate) fn require_non_blank(value: &str, field: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
