//! Error types for Workdesk
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Workdesk operations
///
/// This enum encompasses all possible errors that can occur while serving
/// chat and file-manager requests: configuration loading, provider calls,
/// tool execution, storage-backend operations, and session persistence.
#[derive(Error, Debug)]
pub enum WorkdeskError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider-related errors (API calls, malformed responses, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Tool execution errors
    #[error("Tool execution error: {0}")]
    Tool(String),

    /// Request validation errors (missing/malformed input)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Authentication errors (missing or invalid session token)
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Authorization errors (caller does not own the target resource)
    #[error("Authorization error: {0}")]
    Forbidden(String),

    /// Requested object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Object storage backend errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Chat session persistence errors
    #[error("Session error: {0}")]
    Session(String),

    /// Tool-calling loop exhausted its round budget
    #[error("Tool-calling round limit reached: limit={limit}")]
    RoundLimitExceeded {
        /// The configured round limit
        limit: usize,
    },

    /// Streaming not supported by provider
    #[error("Streaming is not supported by this provider")]
    StreamingNotSupported,

    /// Provider API key is not configured
    #[error("Missing API key for provider: {0}")]
    MissingApiKey(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Workdesk operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = WorkdeskError::Config("invalid format".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid format");
    }

    #[test]
    fn test_provider_error_display() {
        let error = WorkdeskError::Provider("API timeout".to_string());
        assert_eq!(error.to_string(), "Provider error: API timeout");
    }

    #[test]
    fn test_tool_error_display() {
        let error = WorkdeskError::Tool("bad arguments".to_string());
        assert_eq!(error.to_string(), "Tool execution error: bad arguments");
    }

    #[test]
    fn test_validation_error_display() {
        let error = WorkdeskError::Validation("Invalid message content".to_string());
        assert_eq!(
            error.to_string(),
            "Validation error: Invalid message content"
        );
    }

    #[test]
    fn test_authentication_error_display() {
        let error = WorkdeskError::Authentication("Unauthorized".to_string());
        assert_eq!(error.to_string(), "Authentication error: Unauthorized");
    }

    #[test]
    fn test_forbidden_error_display() {
        let error = WorkdeskError::Forbidden("not your file".to_string());
        assert_eq!(error.to_string(), "Authorization error: not your file");
    }

    #[test]
    fn test_not_found_error_display() {
        let error = WorkdeskError::NotFound("users/1/a.txt".to_string());
        assert_eq!(error.to_string(), "Not found: users/1/a.txt");
    }

    #[test]
    fn test_round_limit_error_display() {
        let error = WorkdeskError::RoundLimitExceeded { limit: 5 };
        assert!(error.to_string().contains("limit=5"));
    }

    #[test]
    fn test_streaming_not_supported_error() {
        let error = WorkdeskError::StreamingNotSupported;
        assert_eq!(
            error.to_string(),
            "Streaming is not supported by this provider"
        );
    }

    #[test]
    fn test_missing_api_key_error_display() {
        let error = WorkdeskError::MissingApiKey("anthropic".to_string());
        assert_eq!(error.to_string(), "Missing API key for provider: anthropic");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: WorkdeskError = io_error.into();
        assert!(matches!(error, WorkdeskError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_str = "{invalid json}";
        let json_error = serde_json::from_str::<serde_json::Value>(json_str).unwrap_err();
        let error: WorkdeskError = json_error.into();
        assert!(matches!(error, WorkdeskError::Serialization(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_str = "invalid: : yaml";
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>(yaml_str).unwrap_err();
        let error: WorkdeskError = yaml_error.into();
        assert!(matches!(error, WorkdeskError::Yaml(_)));
    }

    #[test]
    fn test_storage_error_display() {
        let error = WorkdeskError::Storage("backend returned 503".to_string());
        assert_eq!(error.to_string(), "Storage error: backend returned 503");
    }

    #[test]
    fn test_session_error_display() {
        let error = WorkdeskError::Session("corrupt record".to_string());
        assert_eq!(error.to_string(), "Session error: corrupt record");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WorkdeskError>();
    }
}
