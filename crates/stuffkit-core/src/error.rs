//! Error types module
//!
//! Every stuffkit component defines its own error enum. They all implement
//! [`ErrorMetadata`] so callers can classify failures (log level, retryability)
//! without matching on component-specific variants.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like invalid input
    Debug,
    /// Warning level - for recoverable issues like a vendor timeout
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Self-description shared by all component errors
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "INVALID_TOKEN")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;

    /// Emit the error through `tracing` at its own level.
    fn log(&self, context: &str)
    where
        Self: std::fmt::Display,
    {
        match self.log_level() {
            LogLevel::Debug => {
                tracing::debug!(code = self.error_code(), error = %self, "{}", context)
            }
            LogLevel::Warn => {
                tracing::warn!(code = self.error_code(), error = %self, "{}", context)
            }
            LogLevel::Error => {
                tracing::error!(code = self.error_code(), error = %self, "{}", context)
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unexpected signing method: {0}")]
    UnexpectedSigningMethod(String),

    #[error("Token used before issued")]
    UsedBeforeIssued,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
}

impl ErrorMetadata for CoreError {
    fn error_code(&self) -> &'static str {
        match self {
            CoreError::Config(_) => "CONFIG_ERROR",
            CoreError::UnexpectedSigningMethod(_) => "UNEXPECTED_SIGNING_METHOD",
            CoreError::UsedBeforeIssued => "TOKEN_USED_BEFORE_ISSUED",
            CoreError::InvalidToken(_) => "INVALID_TOKEN",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }

    fn log_level(&self) -> LogLevel {
        match self {
            CoreError::Config(_) => LogLevel::Error,
            _ => LogLevel::Debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_metadata() {
        let err = CoreError::UnexpectedSigningMethod("RS256".to_string());
        assert_eq!(err.error_code(), "UNEXPECTED_SIGNING_METHOD");
        assert!(!err.is_recoverable());
        assert_eq!(err.log_level(), LogLevel::Debug);
        assert_eq!(err.to_string(), "Unexpected signing method: RS256");
    }

    #[test]
    fn test_config_error_logs_at_error_level() {
        let err = CoreError::Config("REDIS_HOST must be set".to_string());
        assert_eq!(err.error_code(), "CONFIG_ERROR");
        assert_eq!(err.log_level(), LogLevel::Error);
    }
}
