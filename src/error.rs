use thiserror::Error;

/// Custom error types for the codeshare server
#[derive(Debug, Error)]
pub enum CodeshareError {
    /// State store errors
    #[error("State store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Stored room document is malformed: {0}")]
    CorruptDocument(String),

    /// Signaling errors
    #[error("Failed to serialize message: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Convenience type alias for Results using CodeshareError
pub type Result<T> = std::result::Result<T, CodeshareError>;

impl CodeshareError {
    /// Helper to create StoreUnavailable errors with context
    pub fn store(msg: impl Into<String>) -> Self {
        CodeshareError::StoreUnavailable(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CodeshareError::CorruptDocument("not a document".to_string());
        assert_eq!(
            err.to_string(),
            "Stored room document is malformed: not a document"
        );
    }

    #[test]
    fn test_error_helpers() {
        let err = CodeshareError::store("connection refused");
        assert!(matches!(err, CodeshareError::StoreUnavailable(_)));
    }
}
