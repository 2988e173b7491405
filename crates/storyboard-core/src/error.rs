//! Error types for the Storyboard client.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the entire Storyboard client.
///
/// Variants follow how a failure is surfaced to the user: transport and
/// rejected requests become a visible status, decode errors are logged and
/// skipped. None of them is fatal to the process.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum StoryboardError {
    /// The stream or request never completed (connection, timeout, non-2xx status)
    #[error("Transport error: {message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// A single event payload could not be decoded
    #[error("Decode error: {message} (segment: {segment})")]
    Decode { segment: String, message: String },

    /// The collaborator answered with `success: false`
    #[error("Request rejected by {endpoint}: {message}")]
    Rejected {
        endpoint: String,
        message: String,
    },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Local storage error (locking, layout)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoryboardError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a Transport error without an HTTP status
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }

    /// Creates a Transport error for a non-success HTTP status
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self::Transport {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Creates a Decode error for one event segment
    pub fn decode(segment: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            segment: segment.into(),
            message: message.into(),
        }
    }

    /// Creates a Rejected error for an endpoint that returned `success: false`
    pub fn rejected(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a Transport error
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Check if this is a Decode error
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    /// Check if this is a Rejected error
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Check if this is a serialization error
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }

    /// Short, user-facing description used for status lines.
    pub fn status_text(&self) -> String {
        match self {
            Self::Transport {
                status: Some(code), ..
            } => format!("server returned {}", code),
            Self::Transport { message, .. } => message.clone(),
            Self::Rejected { endpoint, .. } => format!("{} reported failure", endpoint),
            other => other.to_string(),
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for StoryboardError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for StoryboardError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for StoryboardError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for StoryboardError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// Conversion from anyhow::Error (binary glue only)
impl From<anyhow::Error> for StoryboardError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// A type alias for `Result<T, StoryboardError>`.
pub type Result<T> = std::result::Result<T, StoryboardError>;
