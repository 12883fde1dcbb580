//! Error types for Westline
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// An inline, user-facing validation failure for a form field
///
/// Validation failures are never fatal: the caller shows `message` next to
/// the offending field and lets the user try again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Name of the field that failed validation (e.g. `email`)
    pub field: &'static str,
    /// Message shown to the user
    pub message: String,
}

impl FieldError {
    /// Create a new field error
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Main error type for Westline operations
///
/// This enum encompasses all possible errors that can occur during
/// configuration loading, storage access, authentication, session routing,
/// conversation management and gateway interactions.
#[derive(Error, Debug)]
pub enum WestlineError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// AI gateway errors (API calls, malformed responses, etc.)
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Storage backend errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Form validation failed
    #[error("Validation failed: {0}")]
    Validation(FieldError),

    /// An account with the given email already exists
    #[error("An account with this email already exists.")]
    AccountExists,

    /// Login failed
    #[error("Invalid email or password.")]
    InvalidCredentials,

    /// An operation required a signed-in user
    #[error("Not signed in")]
    NotAuthenticated,

    /// Screen routing rejected a transition
    #[error("Invalid screen transition: {from} -> {to}")]
    InvalidTransition {
        /// Screen the session was on
        from: String,
        /// Screen that was requested
        to: String,
    },

    /// Conversation lookup failed
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    /// Message lookup failed
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// A response is already streaming for this conversation
    #[error("A response is already streaming for conversation {0}")]
    StreamInFlight(String),

    /// Missing credentials for the gateway
    #[error("Missing credentials for gateway: {0}")]
    MissingCredentials(String),

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

    /// Keyring/credential storage errors
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// SQLite errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// WAV encoding errors
    #[error("Audio error: {0}")]
    Audio(#[from] hound::Error),
}

/// Result type alias for Westline operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = WestlineError::Config("invalid format".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid format");
    }

    #[test]
    fn test_gateway_error_display() {
        let error = WestlineError::Gateway("API timeout".to_string());
        assert_eq!(error.to_string(), "Gateway error: API timeout");
    }

    #[test]
    fn test_validation_error_displays_field_message() {
        let error = WestlineError::Validation(FieldError::new(
            "password",
            "Password must be at least 6 characters.",
        ));
        assert_eq!(
            error.to_string(),
            "Validation failed: Password must be at least 6 characters."
        );
    }

    #[test]
    fn test_account_exists_display() {
        assert_eq!(
            WestlineError::AccountExists.to_string(),
            "An account with this email already exists."
        );
    }

    #[test]
    fn test_invalid_transition_display() {
        let error = WestlineError::InvalidTransition {
            from: "splash".to_string(),
            to: "login".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid screen transition: splash -> login"
        );
    }

    #[test]
    fn test_stream_in_flight_display() {
        let error = WestlineError::StreamInFlight("convo-1".to_string());
        assert!(error.to_string().contains("convo-1"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: WestlineError = io_error.into();
        assert!(matches!(error, WestlineError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let error: WestlineError = json_error.into();
        assert!(matches!(error, WestlineError::Serialization(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: : yaml").unwrap_err();
        let error: WestlineError = yaml_error.into();
        assert!(matches!(error, WestlineError::Yaml(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WestlineError>();
    }
}
