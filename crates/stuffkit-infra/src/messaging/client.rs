use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use stuffkit_core::config::env_opt;

use super::auth::{Credentials, TokenProvider};
use super::{MessagingError, Opts};

const PUBSUB_API_BASE: &str = "https://pubsub.googleapis.com/v1";

/// Authenticated JSON calls against the Pub/Sub REST API
#[derive(Clone)]
pub(crate) struct PubSubClient {
    http_client: reqwest::Client,
    base_url: String,
    tokens: Arc<TokenProvider>,
}

impl PubSubClient {
    /// Emulator when `PUBSUB_EMULATOR_HOST` is set, otherwise the key file
    /// named by `GOOGLE_APPLICATION_CREDENTIALS`, otherwise the metadata server.
    pub(crate) async fn from_env() -> Result<Self, MessagingError> {
        let http_client = reqwest::Client::new();
        if let Some(host) = env_opt("PUBSUB_EMULATOR_HOST") {
            return Ok(Self::emulator(&host, http_client));
        }
        let tokens = match env_opt("GOOGLE_APPLICATION_CREDENTIALS") {
            Some(path) => TokenProvider::new(Credentials::from_file(&path).await?, http_client.clone()),
            None => TokenProvider::metadata(http_client.clone()),
        };
        Ok(Self::new(PUBSUB_API_BASE, tokens, http_client))
    }

    /// Emulator first, then `credentials_file`, then `credentials_json`.
    /// `opts.timeout` is left to the caller.
    pub(crate) async fn from_opts(opts: &Opts) -> Result<Self, MessagingError> {
        let http_client = reqwest::Client::new();
        let emulator_host = if opts.emulator_host.is_empty() {
            env_opt("PUBSUB_EMULATOR_HOST")
        } else {
            Some(opts.emulator_host.clone())
        };

        let client = match emulator_host {
            Some(host) => Self::emulator(&host, http_client),
            None => {
                let credentials = if !opts.credentials_file.is_empty() {
                    Credentials::from_file(&opts.credentials_file).await?
                } else if !opts.credentials_json.is_empty() {
                    Credentials::from_json(&opts.credentials_json)?
                } else {
                    return Err(MessagingError::Credentials(
                        "neither credentials_file nor credentials_json is set".to_string(),
                    ));
                };
                let tokens = TokenProvider::new(credentials, http_client.clone());
                Self::new(PUBSUB_API_BASE, tokens, http_client)
            }
        };
        Ok(client)
    }

    fn emulator(host: &str, http_client: reqwest::Client) -> Self {
        tracing::debug!(host = %host, "Using Pub/Sub emulator");
        let tokens = TokenProvider::new(Credentials::None, http_client.clone());
        Self::new(&format!("http://{}/v1", host), tokens, http_client)
    }

    fn new(base_url: &str, tokens: TokenProvider, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens: Arc::new(tokens),
        }
    }

    /// POST `body` to `{base}/{path}` and decode the JSON reply.
    pub(crate) async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, MessagingError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.post_with_timeout(path, body, None).await
    }

    /// Like [`post`](Self::post), bounded by `timeout` when set.
    pub(crate) async fn post_with_timeout<B, R>(
        &self,
        path: &str,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<R, MessagingError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, path);
        let mut request = self.http_client.post(&url).json(body);
        if let Some(token) = self.tokens.token().await? {
            request = request.bearer_auth(token);
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(MessagingError::Api { status, body });
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Client for a mock server speaking the emulator protocol
    pub(crate) fn emulator_client(server: &mockito::ServerGuard) -> PubSubClient {
        PubSubClient::emulator(&server.host_with_port(), reqwest::Client::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_opts_uses_emulator_host() {
        let opts = Opts {
            emulator_host: "localhost:8085".to_string(),
            timeout: 250,
            ..Default::default()
        };
        let client = PubSubClient::from_opts(&opts).await.unwrap();
        assert_eq!(client.base_url, "http://localhost:8085/v1");
        assert!(client.tokens.token().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_from_opts_reads_credentials_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key.json");
        std::fs::write(
            &path,
            r#"{"client_email":"svc@demo.iam.gserviceaccount.com","private_key":"pem","token_uri":"http://127.0.0.1:9/token"}"#,
        )
        .unwrap();

        let opts = Opts {
            credentials_file: path.to_string_lossy().to_string(),
            credentials_json: b"ignored".to_vec(),
            emulator_host: String::new(),
            timeout: 0,
        };
        // Only fails when the emulator variable redirects every client
        if std::env::var("PUBSUB_EMULATOR_HOST").is_err() {
            let client = PubSubClient::from_opts(&opts).await.unwrap();
            assert_eq!(client.base_url, PUBSUB_API_BASE);
        }
    }

    #[tokio::test]
    async fn test_from_opts_without_credentials_fails() {
        if std::env::var("PUBSUB_EMULATOR_HOST").is_ok() {
            return;
        }
        let result = PubSubClient::from_opts(&Opts::default()).await;
        assert!(matches!(result, Err(MessagingError::Credentials(_))));
    }

    #[tokio::test]
    async fn test_post_maps_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/projects/p/topics/t:publish")
            .with_status(404)
            .with_body("Resource not found")
            .create_async()
            .await;

        let client = test_support::emulator_client(&server);
        let result: Result<serde_json::Value, _> = client
            .post("projects/p/topics/t:publish", &serde_json::json!({}))
            .await;
        match result {
            Err(MessagingError::Api { status, body }) => {
                assert_eq!(status.as_u16(), 404);
                assert_eq!(body, "Resource not found");
            }
            other => panic!("expected API error, got {:?}", other),
        }
    }
}
