//! Bearer-token providers for the agent-engine API.
//!
//! Tokens are scoped to the cloud-platform permission. The service-account
//! and metadata-server providers cache the last token until shortly before
//! it expires; the static provider always returns the same token.

use crate::error::AgentError;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{future::Future, path::Path, time::Duration};
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Longest wait for one token request, from connect to the end of the body.
pub const DEFAULT_TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// An OAuth2 access token used as `Authorization: Bearer <token>`.
#[derive(Clone, Debug)]
pub struct BearerToken {
    secret: SecretString,
    expires_at: Option<DateTime<Utc>>,
}

impl BearerToken {
    pub fn new(token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            secret: SecretString::from(token.into()),
            expires_at,
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// The full `Authorization` header value.
    pub fn header_value(&self) -> String {
        format!("Bearer {}", self.secret.expose_secret())
    }

    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at
                .checked_sub_signed(TimeDelta::seconds(EXPIRY_MARGIN_SECS))
                .is_some_and(|refresh_at| refresh_at > now),
            None => true,
        }
    }
}

/// A source of bearer tokens for the agent-engine API.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a token that is valid for at least the next minute.
    async fn get_token(&self) -> Result<BearerToken, AgentError>;
}

/// Always returns the same token. Used for local development and tests.
pub struct StaticTokenProvider {
    token: BearerToken,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: BearerToken::new(token, None),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(&self) -> Result<BearerToken, AgentError> {
        Ok(self.token.clone())
    }
}

/// The token endpoint response shared by the OAuth2 and metadata-server flows.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_token(self, issued_at: DateTime<Utc>) -> Result<BearerToken, AgentError> {
        let expires_at = match self.expires_in {
            Some(secs) => Some(
                TimeDelta::try_seconds(secs)
                    .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
                    .ok_or_else(|| {
                        AgentError::Auth(format!("invalid expires_in: {}", secs))
                    })?,
            ),
            None => None,
        };
        Ok(BearerToken::new(self.access_token, expires_at))
    }
}

async fn read_token_response(response: reqwest::Response) -> Result<TokenResponse, AgentError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AgentError::Auth(format!(
            "token endpoint returned {}: {}",
            status, body
        )));
    }
    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| AgentError::Auth(format!("invalid token response: {}", e)))
}

/// Holds the last token. The lock is held across a refresh so concurrent
/// callers share one request; each request is bounded by the provider's timeout.
#[derive(Default)]
struct TokenCache {
    slot: Mutex<Option<BearerToken>>,
}

impl TokenCache {
    async fn get_or_refresh<F, Fut>(&self, refresh: F) -> Result<BearerToken, AgentError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<BearerToken, AgentError>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(token) = slot.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.clone());
        }
        let token = refresh().await?;
        *slot = Some(token.clone());
        Ok(token)
    }
}

/// The fields of a service-account JSON key file that the token flow needs.
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key_id: Option<String>,
    pub private_key: SecretString,
    pub token_uri: String,
    pub project_id: Option<String>,
}

#[derive(Deserialize)]
struct ServiceAccountKeyFile {
    client_email: String,
    private_key: String,
    private_key_id: Option<String>,
    token_uri: Option<String>,
    project_id: Option<String>,
}

impl ServiceAccountKey {
    /// Parses the contents of a service-account key file.
    pub fn from_json(json: &str) -> Result<Self, AgentError> {
        let file: ServiceAccountKeyFile = serde_json::from_str(json)
            .map_err(|e| AgentError::Auth(format!("malformed service account key: {}", e)))?;
        Ok(Self {
            client_email: file.client_email,
            private_key_id: file.private_key_id,
            private_key: SecretString::from(file.private_key),
            token_uri: file
                .token_uri
                .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string()),
            project_id: file.project_id,
        })
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Exchanges a signed service-account assertion for an access token.
pub struct ServiceAccountTokenProvider {
    client: reqwest::Client,
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    scope: String,
    timeout: Duration,
    cache: TokenCache,
}

impl ServiceAccountTokenProvider {
    /// Builds a provider from a parsed key. Fails if the private key is not valid RSA PEM.
    pub fn new(key: ServiceAccountKey) -> Result<Self, AgentError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.expose_secret().as_bytes())
            .map_err(|e| AgentError::Auth(format!("invalid service account private key: {}", e)))?;
        Ok(Self {
            client: reqwest::Client::new(),
            key,
            encoding_key,
            scope: CLOUD_PLATFORM_SCOPE.to_string(),
            timeout: DEFAULT_TOKEN_REQUEST_TIMEOUT,
            cache: TokenCache::default(),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Loads the key file at `path`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AgentError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            AgentError::Auth(format!(
                "cannot read service account key {}: {}",
                path.display(),
                e
            ))
        })?;
        let key = ServiceAccountKey::from_json(&json)?;
        info!(
            client_email = %key.client_email,
            project_id = ?key.project_id,
            "Loaded service account credentials"
        );
        Self::new(key)
    }

    fn sign_assertion(&self, now: DateTime<Utc>) -> Result<String, AgentError> {
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: &self.scope,
            aud: &self.key.token_uri,
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();
        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| AgentError::Auth(format!("failed to sign token assertion: {}", e)))
    }

    async fn fetch(&self) -> Result<BearerToken, AgentError> {
        let now = Utc::now();
        let assertion = self.sign_assertion(now)?;
        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AgentError::Auth(format!("token request failed: {}", e)))?;
        let token = read_token_response(response).await?.into_token(now)?;
        debug!(client_email = %self.key.client_email, expires_at = ?token.expires_at(), "Refreshed service account token");
        Ok(token)
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountTokenProvider {
    async fn get_token(&self) -> Result<BearerToken, AgentError> {
        self.cache.get_or_refresh(|| self.fetch()).await
    }
}

/// Fetches the runtime's default service-account token from the metadata server.
pub struct MetadataServerTokenProvider {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    cache: TokenCache,
}

impl MetadataServerTokenProvider {
    pub fn new() -> Self {
        Self::with_url(METADATA_TOKEN_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            timeout: DEFAULT_TOKEN_REQUEST_TIMEOUT,
            cache: TokenCache::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn fetch(&self) -> Result<BearerToken, AgentError> {
        let now = Utc::now();
        let response = self
            .client
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AgentError::Auth(format!("metadata server request failed: {}", e)))?;
        let token = read_token_response(response).await?.into_token(now)?;
        debug!(expires_at = ?token.expires_at(), "Refreshed metadata server token");
        Ok(token)
    }
}

impl Default for MetadataServerTokenProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenProvider for MetadataServerTokenProvider {
    async fn get_token(&self) -> Result<BearerToken, AgentError> {
        self.cache.get_or_refresh(|| self.fetch()).await
    }
}
