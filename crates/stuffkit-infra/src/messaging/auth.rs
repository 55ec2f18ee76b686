use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::MessagingError;

pub(crate) const PUBSUB_SCOPE: &str = "https://www.googleapis.com/auth/pubsub";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const REFRESH_TOKEN_GRANT: &str = "refresh_token";
const AUTHORIZED_USER: &str = "authorized_user";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Tokens are refreshed this long before they expire
const EXPIRY_MARGIN_SECS: i64 = 60;

/// The fields of a Google service account JSON key used for token exchange
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl ServiceAccountKey {
    pub fn from_json(json: &[u8]) -> Result<Self, MessagingError> {
        serde_json::from_slice(json)
            .map_err(|e| MessagingError::Credentials(format!("invalid service account key: {}", e)))
    }

    pub async fn from_file(path: &str) -> Result<Self, MessagingError> {
        let json = tokio::fs::read(path).await?;
        Self::from_json(&json)
    }
}

/// gcloud user credentials (`gcloud auth application-default login`)
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizedUserKey {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Debug, Deserialize)]
struct CredentialsType {
    #[serde(rename = "type", default)]
    kind: String,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - ChronoDuration::seconds(EXPIRY_MARGIN_SECS) > now
    }
}

pub(crate) enum Credentials {
    /// Emulator: no authentication
    None,
    ServiceAccount(ServiceAccountKey),
    AuthorizedUser(AuthorizedUserKey),
    /// GCE metadata server at the given token URL
    Metadata(String),
}

impl Credentials {
    /// A credentials JSON file: `authorized_user`, otherwise a service account key.
    pub(crate) fn from_json(json: &[u8]) -> Result<Self, MessagingError> {
        let kind: CredentialsType = serde_json::from_slice(json)
            .map_err(|e| MessagingError::Credentials(format!("invalid credentials file: {}", e)))?;
        if kind.kind == AUTHORIZED_USER {
            let key = serde_json::from_slice(json).map_err(|e| {
                MessagingError::Credentials(format!("invalid authorized user credentials: {}", e))
            })?;
            return Ok(Credentials::AuthorizedUser(key));
        }
        ServiceAccountKey::from_json(json).map(Credentials::ServiceAccount)
    }

    pub(crate) async fn from_file(path: &str) -> Result<Self, MessagingError> {
        let json = tokio::fs::read(path).await?;
        Self::from_json(&json)
    }
}

/// Bearer tokens for Pub/Sub requests, cached until shortly before expiry
pub(crate) struct TokenProvider {
    credentials: Credentials,
    http_client: reqwest::Client,
    cache: RwLock<Option<CachedToken>>,
}

impl TokenProvider {
    pub(crate) fn new(credentials: Credentials, http_client: reqwest::Client) -> Self {
        Self {
            credentials,
            http_client,
            cache: RwLock::new(None),
        }
    }

    pub(crate) fn metadata(http_client: reqwest::Client) -> Self {
        Self::new(Credentials::Metadata(METADATA_TOKEN_URL.to_string()), http_client)
    }

    /// Current access token; `None` when requests go unauthenticated.
    pub(crate) async fn token(&self) -> Result<Option<String>, MessagingError> {
        if matches!(self.credentials, Credentials::None) {
            return Ok(None);
        }

        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_fresh(Utc::now()) {
                    return Ok(Some(cached.access_token.clone()));
                }
            }
        }

        let mut cache = self.cache.write().await;
        // Another task may have refreshed while we waited for the lock
        if let Some(cached) = cache.as_ref() {
            if cached.is_fresh(Utc::now()) {
                return Ok(Some(cached.access_token.clone()));
            }
        }

        let fetched = match &self.credentials {
            Credentials::None => return Ok(None),
            Credentials::ServiceAccount(key) => self.exchange_assertion(key).await?,
            Credentials::AuthorizedUser(key) => self.refresh_user_token(key).await?,
            Credentials::Metadata(url) => self.fetch_metadata_token(url).await?,
        };
        tracing::debug!(expires_in = fetched.expires_in, "Pub/Sub access token refreshed");

        let token = fetched.access_token.clone();
        *cache = Some(CachedToken {
            access_token: fetched.access_token,
            expires_at: Utc::now() + ChronoDuration::seconds(fetched.expires_in),
        });
        Ok(Some(token))
    }

    async fn exchange_assertion(&self, key: &ServiceAccountKey) -> Result<TokenResponse, MessagingError> {
        let assertion = sign_assertion(key, Utc::now())?;
        let response = self
            .http_client
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        parse_token_response(response).await
    }

    async fn refresh_user_token(&self, key: &AuthorizedUserKey) -> Result<TokenResponse, MessagingError> {
        let response = self
            .http_client
            .post(&key.token_uri)
            .form(&[
                ("grant_type", REFRESH_TOKEN_GRANT),
                ("client_id", key.client_id.as_str()),
                ("client_secret", key.client_secret.as_str()),
                ("refresh_token", key.refresh_token.as_str()),
            ])
            .send()
            .await?;
        parse_token_response(response).await
    }

    async fn fetch_metadata_token(&self, url: &str) -> Result<TokenResponse, MessagingError> {
        let response = self
            .http_client
            .get(url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;
        parse_token_response(response).await
    }
}

async fn parse_token_response(response: reqwest::Response) -> Result<TokenResponse, MessagingError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(MessagingError::Auth(format!("{} - {}", status, body)));
    }
    Ok(response.json().await?)
}

/// RS256 assertion for the JWT bearer grant.
fn sign_assertion(key: &ServiceAccountKey, now: DateTime<Utc>) -> Result<String, MessagingError> {
    let iat = now.timestamp();
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: PUBSUB_SCOPE,
        aud: &key.token_uri,
        iat,
        exp: iat + ASSERTION_LIFETIME_SECS,
    };
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| MessagingError::Credentials(format!("invalid private key: {}", e)))?;
    Ok(encode(&header, &claims, &encoding_key)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
    use mockito::Matcher;

    const TEST_KEY: &str = include_str!("testdata/service_account_key.pem");

    fn key(token_uri: &str) -> ServiceAccountKey {
        ServiceAccountKey {
            client_email: "publisher@demo.iam.gserviceaccount.com".to_string(),
            private_key: TEST_KEY.to_string(),
            private_key_id: Some("kid-1".to_string()),
            token_uri: token_uri.to_string(),
            project_id: Some("demo".to_string()),
        }
    }

    #[test]
    fn test_service_account_key_from_json() {
        let json = br#"{"type":"service_account","client_email":"a@b.iam.gserviceaccount.com","private_key":"pem"}"#;
        let key = ServiceAccountKey::from_json(json).unwrap();
        assert_eq!(key.client_email, "a@b.iam.gserviceaccount.com");
        assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
        assert!(key.private_key_id.is_none());

        assert!(matches!(
            ServiceAccountKey::from_json(b"{}"),
            Err(MessagingError::Credentials(_))
        ));
    }

    #[test]
    fn test_sign_assertion_claims() {
        let now = Utc::now();
        let jwt = sign_assertion(&key("https://oauth2.example/token"), now).unwrap();
        let parts: Vec<&str> = jwt.split('.').collect();
        assert_eq!(parts.len(), 3);

        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[0]).unwrap()).unwrap();
        assert_eq!(header["alg"], "RS256");
        assert_eq!(header["kid"], "kid-1");

        let claims: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(parts[1]).unwrap()).unwrap();
        assert_eq!(claims["iss"], "publisher@demo.iam.gserviceaccount.com");
        assert_eq!(claims["scope"], PUBSUB_SCOPE);
        assert_eq!(claims["aud"], "https://oauth2.example/token");
        assert_eq!(claims["exp"].as_i64().unwrap() - claims["iat"].as_i64().unwrap(), 3600);
    }

    #[test]
    fn test_sign_assertion_rejects_bad_key() {
        let mut bad = key("https://oauth2.example/token");
        bad.private_key = "not a pem".to_string();
        assert!(matches!(
            sign_assertion(&bad, Utc::now()),
            Err(MessagingError::Credentials(_))
        ));
    }

    #[tokio::test]
    async fn test_service_account_token_is_cached() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(Matcher::UrlEncoded("grant_type".into(), JWT_BEARER_GRANT.into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"ya29.token","expires_in":3599,"token_type":"Bearer"}"#)
            .expect(1)
            .create_async()
            .await;

        let provider = TokenProvider::new(
            Credentials::ServiceAccount(key(&format!("{}/token", server.url()))),
            reqwest::Client::new(),
        );
        assert_eq!(provider.token().await.unwrap().as_deref(), Some("ya29.token"));
        assert_eq!(provider.token().await.unwrap().as_deref(), Some("ya29.token"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_short_lived_token_is_refreshed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/token")
            .match_header("metadata-flavor", "Google")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"meta-token","expires_in":30}"#)
            .expect(2)
            .create_async()
            .await;

        let provider = TokenProvider::new(
            Credentials::Metadata(format!("{}/token", server.url())),
            reqwest::Client::new(),
        );
        provider.token().await.unwrap();
        provider.token().await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_token_exchange_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/token")
            .with_status(400)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let provider = TokenProvider::new(
            Credentials::ServiceAccount(key(&format!("{}/token", server.url()))),
            reqwest::Client::new(),
        );
        assert!(matches!(provider.token().await, Err(MessagingError::Auth(_))));
    }

    #[test]
    fn test_credentials_from_json_by_type() {
        let user = br#"{"type":"authorized_user","client_id":"cid","client_secret":"cs","refresh_token":"rt"}"#;
        match Credentials::from_json(user).unwrap() {
            Credentials::AuthorizedUser(key) => {
                assert_eq!(key.refresh_token, "rt");
                assert_eq!(key.token_uri, DEFAULT_TOKEN_URI);
            }
            _ => panic!("expected authorized user credentials"),
        }

        let service = br#"{"type":"service_account","client_email":"a@b","private_key":"pem"}"#;
        assert!(matches!(
            Credentials::from_json(service).unwrap(),
            Credentials::ServiceAccount(_)
        ));

        let incomplete = br#"{"type":"authorized_user","client_id":"cid"}"#;
        assert!(matches!(
            Credentials::from_json(incomplete),
            Err(MessagingError::Credentials(_))
        ));
    }

    #[tokio::test]
    async fn test_authorized_user_refresh_grant() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("client_id".into(), "cid".into()),
                Matcher::UrlEncoded("refresh_token".into(), "rt".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"user-token","expires_in":3599}"#)
            .expect(1)
            .create_async()
            .await;

        let provider = TokenProvider::new(
            Credentials::AuthorizedUser(AuthorizedUserKey {
                client_id: "cid".to_string(),
                client_secret: "cs".to_string(),
                refresh_token: "rt".to_string(),
                token_uri: format!("{}/token", server.url()),
            }),
            reqwest::Client::new(),
        );
        assert_eq!(provider.token().await.unwrap().as_deref(), Some("user-token"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_emulator_has_no_token() {
        let provider = TokenProvider::new(Credentials::None, reqwest::Client::new());
        assert!(provider.token().await.unwrap().is_none());
    }
}
