use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::task::TaskTracker;

use super::client::PubSubClient;
use super::{MessagingError, Opts};

#[derive(Debug, Serialize)]
struct PublishRequest {
    messages: Vec<PubsubMessage>,
}

#[derive(Debug, Serialize)]
struct PubsubMessage {
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

/// Publishes raw payloads to one topic
pub struct Publisher {
    client: PubSubClient,
    project: String,
    topic: String,
    publish_path: String,
    /// Bound on each publish request
    timeout: Option<Duration>,
    background: TaskTracker,
}

impl Publisher {
    /// Publisher using the default credentials
    pub async fn new(project: &str, topic: &str) -> Result<Self, MessagingError> {
        let client = PubSubClient::from_env().await?;
        Ok(Self::with_client(client, project, topic))
    }

    /// Publisher using explicit credentials and timeout
    pub async fn with_opts(project: &str, topic: &str, opts: &Opts) -> Result<Self, MessagingError> {
        let client = PubSubClient::from_opts(opts).await?;
        let mut publisher = Self::with_client(client, project, topic);
        if opts.timeout > 0 {
            publisher.timeout = Some(Duration::from_millis(opts.timeout));
        }
        Ok(publisher)
    }

    pub(crate) fn with_client(client: PubSubClient, project: &str, topic: &str) -> Self {
        Self {
            client,
            project: project.to_string(),
            topic: topic.to_string(),
            publish_path: format!("projects/{}/topics/{}:publish", project, topic),
            timeout: None,
            background: TaskTracker::new(),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish `msg`; true once the server acknowledged it.
    pub async fn send(&self, msg: &[u8]) -> bool {
        match self.send_with_id(msg).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(topic = %self.topic, error = %e, "Publish failed");
                false
            }
        }
    }

    /// Publish `msg` and return the server-assigned message id.
    pub async fn send_with_id(&self, msg: &[u8]) -> Result<String, MessagingError> {
        publish(&self.client, &self.publish_path, msg, self.timeout).await
    }

    /// Publish on a background task. Failures are logged; messages sent
    /// after [`stop`](Self::stop) are dropped.
    pub fn send_background(&self, msg: Vec<u8>) {
        if self.background.is_closed() {
            tracing::warn!(topic = %self.topic, "Publisher stopped, dropping message");
            return;
        }
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(topic = %self.topic, error = %e, "No runtime for background publish");
                return;
            }
        };

        let client = self.client.clone();
        let path = self.publish_path.clone();
        let topic = self.topic.clone();
        let timeout = self.timeout;
        self.background.spawn_on(
            async move {
                if let Err(e) = publish(&client, &path, &msg, timeout).await {
                    tracing::warn!(topic = %topic, error = %e, "Background publish failed");
                }
            },
            &handle,
        );
    }

    /// Stop accepting background sends and wait for the in-flight ones.
    pub async fn stop(&self) {
        self.background.close();
        self.background.wait().await;
        tracing::debug!(topic = %self.topic, "Publisher stopped");
    }
}

async fn publish(
    client: &PubSubClient,
    path: &str,
    msg: &[u8],
    timeout: Option<Duration>,
) -> Result<String, MessagingError> {
    let request = PublishRequest {
        messages: vec![PubsubMessage {
            data: STANDARD.encode(msg),
        }],
    };
    let response: PublishResponse = client.post_with_timeout(path, &request, timeout).await?;
    response
        .message_ids
        .into_iter()
        .next()
        .ok_or(MessagingError::MissingMessageId)
}
