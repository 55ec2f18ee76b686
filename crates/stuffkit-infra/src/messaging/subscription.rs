use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::client::PubSubClient;
use super::{MessagingError, Opts};

const MAX_MESSAGES: u32 = 100;
/// Pause after a pull that returned nothing
const EMPTY_PULL_DELAY: Duration = Duration::from_millis(500);

/// Callback verdict for a received message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckReply {
    Ack,
    /// Make the message available for redelivery right away
    Nack,
}

/// A message delivered by a pull
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub id: String,
    pub data: Vec<u8>,
    pub attributes: HashMap<String, String>,
    pub publish_time: String,
    pub delivery_attempt: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PullRequest {
    max_messages: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullResponse {
    #[serde(default)]
    received_messages: Vec<WireReceived>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireReceived {
    ack_id: String,
    message: WireMessage,
    #[serde(default)]
    delivery_attempt: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireMessage {
    data: String,
    attributes: HashMap<String, String>,
    message_id: String,
    publish_time: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AckRequest<'a> {
    ack_ids: &'a [String],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyAckDeadlineRequest<'a> {
    ack_ids: &'a [String],
    ack_deadline_seconds: u32,
}

/// Pull subscriber for one subscription
pub struct Subscription {
    client: PubSubClient,
    name: String,
    path: String,
}

impl Subscription {
    /// Subscription using the default credentials
    pub async fn new(project: &str, sub_name: &str) -> Result<Self, MessagingError> {
        let client = PubSubClient::from_env().await?;
        Ok(Self::with_client(client, project, sub_name))
    }

    pub async fn with_opts(project: &str, sub_name: &str, opts: &Opts) -> Result<Self, MessagingError> {
        let client = PubSubClient::from_opts(opts).await?;
        Ok(Self::with_client(client, project, sub_name))
    }

    pub(crate) fn with_client(client: PubSubClient, project: &str, sub_name: &str) -> Self {
        Self {
            client,
            name: sub_name.to_string(),
            path: format!("projects/{}/subscriptions/{}", project, sub_name),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pull messages and hand each one to `callback` until `cancel` fires.
    ///
    /// Messages are acknowledged or nacked in batches after every pull.
    /// Returns `Ok` on cancellation and the error of the first failed pull.
    pub async fn receive<F, Fut>(&self, cancel: CancellationToken, mut callback: F) -> Result<(), MessagingError>
    where
        F: FnMut(ReceivedMessage) -> Fut,
        Fut: Future<Output = AckReply>,
    {
        tracing::info!(subscription = %self.name, "Receiving messages");
        loop {
            let pulled = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                pulled = self.pull() => pulled?,
            };

            if pulled.is_empty() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(EMPTY_PULL_DELAY) => continue,
                }
            }

            let mut acks = Vec::new();
            let mut nacks = Vec::new();
            for received in pulled {
                let ack_id = received.ack_id;
                let data = match STANDARD.decode(received.message.data.as_bytes()) {
                    Ok(data) => data,
                    Err(e) => {
                        tracing::warn!(
                            subscription = %self.name,
                            message_id = %received.message.message_id,
                            error = %e,
                            "Undecodable message data, nacking"
                        );
                        nacks.push(ack_id);
                        continue;
                    }
                };
                let message = ReceivedMessage {
                    id: received.message.message_id,
                    data,
                    attributes: received.message.attributes,
                    publish_time: received.message.publish_time,
                    delivery_attempt: received.delivery_attempt,
                };
                match callback(message).await {
                    AckReply::Ack => acks.push(ack_id),
                    AckReply::Nack => nacks.push(ack_id),
                }
            }

            self.acknowledge(&acks).await;
            self.nack(&nacks).await;
        }

        tracing::info!(subscription = %self.name, "Receive cancelled");
        Ok(())
    }

    async fn pull(&self) -> Result<Vec<WireReceived>, MessagingError> {
        let request = PullRequest {
            max_messages: MAX_MESSAGES,
        };
        let response: PullResponse = self
            .client
            .post(&format!("{}:pull", self.path), &request)
            .await?;
        Ok(response.received_messages)
    }

    async fn acknowledge(&self, ack_ids: &[String]) {
        if ack_ids.is_empty() {
            return;
        }
        let result: Result<Value, _> = self
            .client
            .post(&format!("{}:acknowledge", self.path), &AckRequest { ack_ids })
            .await;
        if let Err(e) = result {
            tracing::warn!(subscription = %self.name, count = ack_ids.len(), error = %e, "Acknowledge failed");
        }
    }

    async fn nack(&self, ack_ids: &[String]) {
        if ack_ids.is_empty() {
            return;
        }
        let request = ModifyAckDeadlineRequest {
            ack_ids,
            ack_deadline_seconds: 0,
        };
        let result: Result<Value, _> = self
            .client
            .post(&format!("{}:modifyAckDeadline", self.path), &request)
            .await;
        if let Err(e) = result {
            tracing::warn!(subscription = %self.name, count = ack_ids.len(), error = %e, "Nack failed");
        }
    }
}
