//! Transactional email through Mailgun and Mailjet
//!
//! Both senders are one-shot functions taking a config and the message; they
//! talk to the vendors' HTTP APIs directly. API base URLs are part of the
//! config so EU regions and test servers can be targeted.

mod mailgun;
mod mailjet;

use reqwest::StatusCode;
use stuffkit_core::{ErrorMetadata, LogLevel};
use thiserror::Error;

pub use mailgun::{send_via_mailgun, MailgunConfig, Params, DEFAULT_MAILGUN_API_BASE};
pub use mailjet::{
    send_via_mailjet, Attachment, MailjetConfig, MailjetError, MailjetParams, MailjetRecipientResult,
    MailjetResult, MailjetResults, DEFAULT_MAILJET_API_BASE,
};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Mail API returned {status}: {body}")]
    Api { status: StatusCode, body: String },

    #[error("Invalid mail request: {0}")]
    InvalidRequest(String),
}

impl ErrorMetadata for MailError {
    fn error_code(&self) -> &'static str {
        match self {
            MailError::Http(_) => "MAIL_HTTP_ERROR",
            MailError::Api { .. } => "MAIL_API_ERROR",
            MailError::InvalidRequest(_) => "MAIL_INVALID_REQUEST",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            MailError::Http(e) => e.is_timeout() || e.is_connect(),
            MailError::Api { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            MailError::InvalidRequest(_) => false,
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            MailError::InvalidRequest(_) => LogLevel::Debug,
            _ if self.is_recoverable() => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

/// Turn a non-2xx response into [`MailError::Api`].
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, MailError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(MailError::Api { status, body })
}
