//! Unified error types for PostPilot.

use thiserror::Error;

/// Result type alias using PostPilotError.
pub type Result<T> = std::result::Result<T, PostPilotError>;

#[derive(Error, Debug)]
pub enum PostPilotError {
    // Remote file store errors
    #[error("Remote storage error: {0}")]
    Remote(String),

    #[error("Remote path not found: {0}")]
    RemoteNotFound(String),

    // Social client errors
    #[error("Social client error: {0}")]
    Social(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Task setup errors
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Invalid schedule mode: {0}")]
    InvalidScheduleMode(String),

    #[error("Schedule error: {0}")]
    Schedule(String),

    // Action errors
    #[error("Task error: {0}")]
    Task(String),

    // General errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("{0}")]
    Other(String),
}

impl PostPilotError {
    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(msg.into())
    }

    pub fn social(msg: impl Into<String>) -> Self {
        Self::Social(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn schedule(msg: impl Into<String>) -> Self {
        Self::Schedule(msg.into())
    }

    pub fn task(msg: impl Into<String>) -> Self {
        Self::Task(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PostPilotError::Remote("timeout".into());
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_error_constructors() {
        let e1 = PostPilotError::remote("test");
        assert!(matches!(e1, PostPilotError::Remote(_)));

        let e2 = PostPilotError::social("test");
        assert!(matches!(e2, PostPilotError::Social(_)));

        let e3 = PostPilotError::config("test");
        assert!(matches!(e3, PostPilotError::Config(_)));

        let e4 = PostPilotError::task("test");
        assert!(matches!(e4, PostPilotError::Task(_)));
    }

    #[test]
    fn test_not_found_stays_distinguishable() {
        let err = PostPilotError::RemoteNotFound("/.store.json".into());
        assert!(matches!(err, PostPilotError::RemoteNotFound(_)));
        assert!(err.to_string().contains("/.store.json"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PostPilotError = io_err.into();
        assert!(matches!(err, PostPilotError::Io(_)));
    }
}
