//! Error types for Neochat
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Neochat operations
///
/// The variants mirror the failure classes of the client: storage problems
/// that callers silently absorb, directory failures that are surfaced, stream
/// outcomes reported through session callbacks, and rendering or clipboard
/// failures that only ever degrade output.
#[derive(Error, Debug)]
pub enum NeochatError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The key-value backend is not available at all
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A storage read or write failed (backend or (de)serialization)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Listing models from the server failed
    #[error("Model directory unavailable: {0}")]
    DirectoryUnavailable(String),

    /// A streaming session was cancelled by the caller
    #[error("Stream cancelled")]
    StreamCancelled,

    /// A streaming session failed for a network or server reason
    #[error("Stream failed: {0}")]
    StreamFailed(String),

    /// Markdown or highlighting failed internally
    #[error("Render failure: {0}")]
    RenderFailure(String),

    /// Writing to the clipboard failed
    #[error("Clipboard failure: {0}")]
    ClipboardFailure(String),

    /// The requested conversation does not exist
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl NeochatError {
    /// Whether this error represents a caller-initiated cancellation
    pub fn is_cancellation(&self) -> bool {
        matches!(self, NeochatError::StreamCancelled)
    }
}

/// Result type alias for Neochat operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

/// Result type for operations whose callers need to inspect the failure kind
pub type TypedResult<T> = std::result::Result<T, NeochatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = NeochatError::Config("invalid format".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid format");
    }

    #[test]
    fn test_directory_unavailable_display() {
        let error = NeochatError::DirectoryUnavailable("connection refused".to_string());
        assert_eq!(
            error.to_string(),
            "Model directory unavailable: connection refused"
        );
    }

    #[test]
    fn test_stream_cancelled_is_cancellation() {
        assert!(NeochatError::StreamCancelled.is_cancellation());
        assert!(!NeochatError::StreamFailed("boom".to_string()).is_cancellation());
    }

    #[test]
    fn test_storage_errors_display() {
        let error = NeochatError::StorageUnavailable("no backend".to_string());
        assert_eq!(error.to_string(), "Storage unavailable: no backend");
        let error = NeochatError::Storage("flush failed".to_string());
        assert_eq!(error.to_string(), "Storage error: flush failed");
    }

    #[test]
    fn test_render_and_clipboard_display() {
        let error = NeochatError::RenderFailure("bad syntax".to_string());
        assert_eq!(error.to_string(), "Render failure: bad syntax");
        let error = NeochatError::ClipboardFailure("no display".to_string());
        assert_eq!(error.to_string(), "Clipboard failure: no display");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: NeochatError = io_error.into();
        assert!(matches!(error, NeochatError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let error: NeochatError = json_error.into();
        assert!(matches!(error, NeochatError::Serialization(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: : yaml").unwrap_err();
        let error: NeochatError = yaml_error.into();
        assert!(matches!(error, NeochatError::Yaml(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NeochatError>();
    }
}
