use serde::Deserialize;
use std::time::Duration;
use stuffkit_core::config::env_or;

use super::{check_status, MailError};

pub const DEFAULT_MAILGUN_API_BASE: &str = "https://api.mailgun.net/v3";

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailgunConfig {
    pub key: String,
    pub domain: String,
    /// `https://api.eu.mailgun.net/v3` for EU domains
    pub api_base: String,
}

impl Default for MailgunConfig {
    fn default() -> Self {
        Self {
            key: String::new(),
            domain: String::new(),
            api_base: DEFAULT_MAILGUN_API_BASE.to_string(),
        }
    }
}

impl MailgunConfig {
    pub fn new(key: &str, domain: &str) -> Self {
        Self {
            key: key.to_string(),
            domain: domain.to_string(),
            ..Default::default()
        }
    }

    /// Read `MAILGUN_KEY`, `MAILGUN_DOMAIN` and `MAILGUN_API_BASE`.
    pub fn from_env() -> Self {
        Self {
            key: env_or("MAILGUN_KEY", ""),
            domain: env_or("MAILGUN_DOMAIN", ""),
            api_base: env_or("MAILGUN_API_BASE", DEFAULT_MAILGUN_API_BASE),
        }
    }
}

/// A Mailgun message. `body` is sent as both the text and the HTML part.
#[derive(Debug, Clone, Default)]
pub struct Params {
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub recipient: String,
    pub reply_to: String,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    /// Request timeout in seconds; 0 means 10
    pub timeout: u64,
}

impl Params {
    fn form(&self) -> Vec<(&'static str, &str)> {
        let mut form = vec![
            ("from", self.sender.as_str()),
            ("to", self.recipient.as_str()),
            ("subject", self.subject.as_str()),
            ("text", self.body.as_str()),
            ("html", self.body.as_str()),
        ];
        if !self.reply_to.is_empty() {
            form.push(("h:Reply-To", self.reply_to.as_str()));
        }
        form.extend(self.cc.iter().map(|addr| ("cc", addr.as_str())));
        form.extend(self.bcc.iter().map(|addr| ("bcc", addr.as_str())));
        form
    }

    fn request_timeout(&self) -> Duration {
        if self.timeout > 0 {
            Duration::from_secs(self.timeout)
        } else {
            Duration::from_secs(DEFAULT_TIMEOUT_SECS)
        }
    }
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    message: String,
    #[serde(default)]
    id: String,
}

/// Send through the Mailgun messages API.
///
/// Returns the API's status message and the queued message id.
pub async fn send_via_mailgun(
    conf: &MailgunConfig,
    params: &Params,
) -> Result<(String, String), MailError> {
    if conf.domain.is_empty() {
        return Err(MailError::InvalidRequest("Mailgun domain is empty".to_string()));
    }

    let url = format!("{}/{}/messages", conf.api_base.trim_end_matches('/'), conf.domain);
    let client = reqwest::Client::builder()
        .timeout(params.request_timeout())
        .build()?;

    let response = client
        .post(&url)
        .basic_auth("api", Some(&conf.key))
        .form(&params.form())
        .send()
        .await?;
    let response = check_status(response).await?;

    let sent: SendResponse = response.json().await?;
    tracing::debug!(id = %sent.id, recipient = %params.recipient, "Mailgun message queued");
    Ok((sent.message, sent.id))
}
