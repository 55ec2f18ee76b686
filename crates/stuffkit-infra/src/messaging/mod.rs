//! Google Cloud Pub/Sub messaging
//!
//! [`Publisher`] publishes raw payloads to a topic and [`Subscription`] runs a
//! pull loop over a subscription. Both talk to the Pub/Sub REST API.
//!
//! Credentials are resolved in this order:
//! 1. `PUBSUB_EMULATOR_HOST` (or [`Opts::emulator_host`]): unauthenticated
//!    requests to the local emulator
//! 2. a credentials file from [`Opts`] or `GOOGLE_APPLICATION_CREDENTIALS`:
//!    a service account key, or `authorized_user` credentials from gcloud
//! 3. the GCE metadata server

mod auth;
mod client;
mod publisher;
mod subscription;

use reqwest::StatusCode;
use stuffkit_core::{ErrorMetadata, LogLevel};
use thiserror::Error;

pub use auth::{AuthorizedUserKey, ServiceAccountKey};
pub use publisher::Publisher;
pub use subscription::{AckReply, ReceivedMessage, Subscription};

/// Client options
#[derive(Debug, Clone, Default)]
pub struct Opts {
    /// Path to a credentials JSON file; takes precedence over `credentials_json`
    pub credentials_file: String,
    /// Credentials JSON contents
    pub credentials_json: Vec<u8>,
    /// Publish timeout in milliseconds; 0 disables it. Pulls are never bounded.
    pub timeout: u64,
    /// `host:port` of a Pub/Sub emulator
    pub emulator_host: String,
}

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Pub/Sub API returned {status}: {body}")]
    Api { status: StatusCode, body: String },

    #[error("Invalid credentials: {0}")]
    Credentials(String),

    #[error("Token exchange failed: {0}")]
    Auth(String),

    #[error("Failed to sign token assertion: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Failed to read credentials: {0}")]
    Io(#[from] std::io::Error),

    #[error("Publish returned no message id")]
    MissingMessageId,
}

impl ErrorMetadata for MessagingError {
    fn error_code(&self) -> &'static str {
        match self {
            MessagingError::Http(_) => "PUBSUB_HTTP_ERROR",
            MessagingError::Api { .. } => "PUBSUB_API_ERROR",
            MessagingError::Credentials(_) => "PUBSUB_CREDENTIALS_ERROR",
            MessagingError::Auth(_) => "PUBSUB_AUTH_ERROR",
            MessagingError::Jwt(_) => "PUBSUB_JWT_ERROR",
            MessagingError::Io(_) => "PUBSUB_IO_ERROR",
            MessagingError::MissingMessageId => "PUBSUB_MISSING_MESSAGE_ID",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            MessagingError::Http(e) => e.is_timeout() || e.is_connect(),
            MessagingError::Api { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            MessagingError::Auth(_) => true,
            _ => false,
        }
    }

    fn log_level(&self) -> LogLevel {
        if self.is_recoverable() {
            LogLevel::Warn
        } else {
            LogLevel::Error
        }
    }
}
