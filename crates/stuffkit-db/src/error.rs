//! Database adapter errors

use stuffkit_core::{ErrorMetadata, LogLevel};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[cfg(feature = "mongodb")]
    #[error("MongoDB error: {0}")]
    Mongo(#[from] ::mongodb::error::Error),

    #[cfg(feature = "mongodb")]
    #[error("BSON encoding error: {0}")]
    BsonEncode(#[from] ::mongodb::bson::ser::Error),

    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Invalid object id: {0}")]
    InvalidObjectId(String),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for database operations
pub type DbResult<T> = Result<T, DbError>;

impl ErrorMetadata for DbError {
    fn error_code(&self) -> &'static str {
        match self {
            #[cfg(feature = "mongodb")]
            DbError::Mongo(_) => "MONGO_ERROR",
            #[cfg(feature = "mongodb")]
            DbError::BsonEncode(_) => "BSON_ENCODE_ERROR",
            #[cfg(feature = "redis")]
            DbError::Redis(_) => "REDIS_ERROR",
            DbError::Pool(_) => "POOL_ERROR",
            DbError::InvalidObjectId(_) => "INVALID_OBJECT_ID",
            DbError::Serialization(_) => "CACHE_SERIALIZATION_ERROR",
            DbError::Config(_) => "CONFIG_ERROR",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            #[cfg(feature = "mongodb")]
            DbError::Mongo(e) => e.contains_label(::mongodb::error::RETRYABLE_WRITE_ERROR),
            #[cfg(feature = "redis")]
            DbError::Redis(e) => e.is_timeout() || e.is_connection_dropped() || e.is_io_error(),
            DbError::Pool(_) => true,
            _ => false,
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            DbError::InvalidObjectId(_) => LogLevel::Debug,
            DbError::Serialization(_) | DbError::Pool(_) => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_error_is_recoverable() {
        let err = DbError::Pool("timed out waiting for connection".to_string());
        assert!(err.is_recoverable());
        assert_eq!(err.error_code(), "POOL_ERROR");
        assert_eq!(err.log_level(), LogLevel::Warn);
    }

    #[test]
    fn test_invalid_object_id_metadata() {
        let err = DbError::InvalidObjectId("xyz".to_string());
        assert!(!err.is_recoverable());
        assert_eq!(err.log_level(), LogLevel::Debug);
        assert_eq!(err.to_string(), "Invalid object id: xyz");
    }
}
