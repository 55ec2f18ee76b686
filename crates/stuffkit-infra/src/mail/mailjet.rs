use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use stuffkit_core::config::env_or;

use super::{check_status, MailError};

pub const DEFAULT_MAILJET_API_BASE: &str = "https://api.mailjet.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailjetConfig {
    pub pub_key: String,
    pub private_key: String,
    pub api_base: String,
}

impl Default for MailjetConfig {
    fn default() -> Self {
        Self {
            pub_key: String::new(),
            private_key: String::new(),
            api_base: DEFAULT_MAILJET_API_BASE.to_string(),
        }
    }
}

impl MailjetConfig {
    /// Read `MAILJET_PUB_KEY`, `MAILJET_PRIVATE_KEY` and `MAILJET_API_BASE`.
    pub fn from_env() -> Self {
        Self {
            pub_key: env_or("MAILJET_PUB_KEY", ""),
            private_key: env_or("MAILJET_PRIVATE_KEY", ""),
            api_base: env_or("MAILJET_API_BASE", DEFAULT_MAILJET_API_BASE),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Attachment {
    pub filename: String,
    /// Base64 encoded file content
    pub content: String,
    /// MIME type; `application/octet-stream` when empty
    pub content_type: String,
}

impl Attachment {
    pub fn from_bytes(filename: &str, content_type: &str, data: &[u8]) -> Self {
        Self {
            filename: filename.to_string(),
            content: STANDARD.encode(data),
            content_type: content_type.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MailjetParams {
    pub sender_email: String,
    pub sender_name: String,
    pub reply_to_email: String,
    pub recipient_email: Vec<String>,
    pub subject: String,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub text_part: String,
    pub html_part: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Recipient<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "is_blank")]
    name: &'a str,
}

fn is_blank(s: &&str) -> bool {
    s.is_empty()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AttachmentBody<'a> {
    content_type: &'a str,
    filename: &'a str,
    base64_content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct MessageBody<'a> {
    from: Recipient<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<Recipient<'a>>,
    to: Vec<Recipient<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cc: Vec<Recipient<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    bcc: Vec<Recipient<'a>>,
    subject: &'a str,
    text_part: &'a str,
    #[serde(rename = "HTMLPart")]
    html_part: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<AttachmentBody<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendBody<'a> {
    messages: Vec<MessageBody<'a>>,
}

fn recipients(emails: &[String]) -> Vec<Recipient<'_>> {
    emails
        .iter()
        .map(|email| Recipient { email, name: "" })
        .collect()
}

impl MailjetParams {
    fn body(&self) -> SendBody<'_> {
        let reply_to = (!self.reply_to_email.is_empty()).then(|| Recipient {
            email: &self.reply_to_email,
            name: "",
        });
        let attachments = self
            .attachments
            .iter()
            .map(|a| AttachmentBody {
                content_type: if a.content_type.is_empty() {
                    DEFAULT_CONTENT_TYPE
                } else {
                    a.content_type.as_str()
                },
                filename: &a.filename,
                base64_content: &a.content,
            })
            .collect();

        SendBody {
            messages: vec![MessageBody {
                from: Recipient {
                    email: &self.sender_email,
                    name: &self.sender_name,
                },
                reply_to,
                to: recipients(&self.recipient_email),
                cc: recipients(&self.cc),
                bcc: recipients(&self.bcc),
                subject: &self.subject,
                text_part: &self.text_part,
                html_part: &self.html_part,
                attachments,
            }],
        }
    }
}

/// Send API v3.1 response
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MailjetResults {
    #[serde(default)]
    pub messages: Vec<MailjetResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MailjetResult {
    pub status: String,
    #[serde(rename = "CustomID")]
    pub custom_id: String,
    pub to: Vec<MailjetRecipientResult>,
    pub cc: Vec<MailjetRecipientResult>,
    pub bcc: Vec<MailjetRecipientResult>,
    pub errors: Vec<MailjetError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MailjetRecipientResult {
    pub email: String,
    #[serde(rename = "MessageUUID")]
    pub message_uuid: String,
    #[serde(rename = "MessageID")]
    pub message_id: i64,
    pub message_href: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MailjetError {
    pub error_identifier: String,
    pub error_code: String,
    pub status_code: u16,
    pub error_message: String,
    pub error_related_to: Vec<String>,
}

/// Send one message through the Mailjet Send API v3.1.
pub async fn send_via_mailjet(
    conf: &MailjetConfig,
    params: &MailjetParams,
) -> Result<MailjetResults, MailError> {
    if params.recipient_email.is_empty() {
        return Err(MailError::InvalidRequest("No recipients".to_string()));
    }

    let url = format!("{}/v3.1/send", conf.api_base.trim_end_matches('/'));
    let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

    let response = client
        .post(&url)
        .basic_auth(&conf.pub_key, Some(&conf.private_key))
        .json(&params.body())
        .send()
        .await?;
    let response = check_status(response).await?;

    let results: MailjetResults = response.json().await?;
    tracing::debug!(
        recipients = params.recipient_email.len(),
        statuses = ?results.messages.iter().map(|m| m.status.as_str()).collect::<Vec<_>>(),
        "Mailjet message sent"
    );
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn params() -> MailjetParams {
        MailjetParams {
            sender_email: "no-reply@shop.io".to_string(),
            sender_name: "Shop".to_string(),
            recipient_email: vec!["jane@example.com".to_string()],
            subject: "Invoice".to_string(),
            text_part: "See attached".to_string(),
            html_part: "<p>See attached</p>".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_body_omits_empty_sections() {
        let value = serde_json::to_value(params().body()).unwrap();
        assert_eq!(
            value,
            json!({
                "Messages": [{
                    "From": {"Email": "no-reply@shop.io", "Name": "Shop"},
                    "To": [{"Email": "jane@example.com"}],
                    "Subject": "Invoice",
                    "TextPart": "See attached",
                    "HTMLPart": "<p>See attached</p>",
                }]
            })
        );
    }

    #[test]
    fn test_body_with_reply_to_copies_and_attachments() {
        let mut p = params();
        p.reply_to_email = "billing@shop.io".to_string();
        p.cc = vec!["boss@example.com".to_string()];
        p.bcc = vec!["audit@shop.io".to_string()];
        p.attachments = vec![
            Attachment::from_bytes("a.txt", "text/plain", b"hello"),
            Attachment {
                filename: "b.bin".to_string(),
                content: "AAE=".to_string(),
                content_type: String::new(),
            },
        ];

        let value = serde_json::to_value(p.body()).unwrap();
        let message = &value["Messages"][0];
        assert_eq!(message["ReplyTo"], json!({"Email": "billing@shop.io"}));
        assert_eq!(message["Cc"], json!([{"Email": "boss@example.com"}]));
        assert_eq!(message["Bcc"], json!([{"Email": "audit@shop.io"}]));
        assert_eq!(
            message["Attachments"],
            json!([
                {"ContentType": "text/plain", "Filename": "a.txt", "Base64Content": "aGVsbG8="},
                {"ContentType": "application/octet-stream", "Filename": "b.bin", "Base64Content": "AAE="},
            ])
        );
    }

    #[tokio::test]
    async fn test_send_parses_results() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v3.1/send")
            // base64("pub-1:priv-2")
            .match_header("authorization", "Basic cHViLTE6cHJpdi0y")
            .match_body(Matcher::Regex(r#""Subject":"Invoice""#.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"Messages":[{"Status":"success","CustomID":"","To":[{"Email":"jane@example.com","MessageUUID":"1ab2","MessageID":576460752303423488,"MessageHref":"https://api.mailjet.com/v3/REST/message/576460752303423488"}],"Cc":[],"Bcc":[]}]}"#,
            )
            .create_async()
            .await;

        let conf = MailjetConfig {
            pub_key: "pub-1".to_string(),
            private_key: "priv-2".to_string(),
            api_base: server.url(),
        };
        let results = send_via_mailjet(&conf, &params()).await.unwrap();
        assert_eq!(results.messages.len(), 1);
        assert_eq!(results.messages[0].status, "success");
        assert_eq!(results.messages[0].to[0].message_id, 576460752303423488);
        assert!(results.messages[0].errors.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_maps_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v3.1/send")
            .with_status(400)
            .with_body(r#"{"Messages":[{"Status":"error"}]}"#)
            .create_async()
            .await;

        let conf = MailjetConfig {
            api_base: server.url(),
            ..Default::default()
        };
        let err = send_via_mailjet(&conf, &params()).await.unwrap_err();
        assert!(matches!(err, MailError::Api { status, .. } if status.as_u16() == 400));
    }

    #[tokio::test]
    async fn test_send_requires_recipient() {
        let p = MailjetParams {
            recipient_email: Vec::new(),
            ..params()
        };
        assert!(matches!(
            send_via_mailjet(&MailjetConfig::default(), &p).await,
            Err(MailError::InvalidRequest(_))
        ));
    }
}
