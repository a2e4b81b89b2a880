//! Agent Engine Adapter
//!
//! Opens conversational sessions on the hosted reasoning engine and runs
//! streamed queries against it. A streamed query is one outbound HTTP
//! connection whose body is read line by line as it arrives; the adapter
//! keeps no state between calls, so one client can serve any number of
//! concurrent users.

use crate::{credentials::TokenProvider, error::AgentError, sse};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

pub const DEFAULT_SESSIONS_API_BASE: &str = "https://aiplatform.googleapis.com/v1beta1";
pub const DEFAULT_LINE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Identifies the reasoning engine and the endpoints used to reach it.
#[derive(Clone, Debug)]
pub struct AgentEngineConfig {
    pub project_id: String,
    pub location: String,
    pub engine_id: String,
    /// Base URL for the session API.
    pub sessions_api_base: String,
    /// Base URL for the streaming query API.
    pub query_api_base: String,
    /// Longest wait for the next line of a streamed response.
    pub line_timeout: Duration,
    /// Longest wait for a whole streamed query, from token to last line.
    pub request_timeout: Duration,
}

impl AgentEngineConfig {
    /// Creates a configuration with the public regional endpoints and default timeouts.
    pub fn new(
        project_id: impl Into<String>,
        location: impl Into<String>,
        engine_id: impl Into<String>,
    ) -> Self {
        let location = location.into();
        Self {
            project_id: project_id.into(),
            query_api_base: format!("https://{}-aiplatform.googleapis.com/v1", location),
            location,
            engine_id: engine_id.into(),
            sessions_api_base: DEFAULT_SESSIONS_API_BASE.to_string(),
            line_timeout: DEFAULT_LINE_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Points both the session and the query API at `base`.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        let base = base.into();
        self.sessions_api_base = base.clone();
        self.query_api_base = base;
        self
    }

    pub fn with_timeouts(mut self, line_timeout: Duration, request_timeout: Duration) -> Self {
        self.line_timeout = line_timeout;
        self.request_timeout = request_timeout;
        self
    }

    /// The engine's resource path, `projects/<p>/locations/<l>/reasoningEngines/<e>`.
    pub fn engine_resource(&self) -> String {
        format!(
            "projects/{}/locations/{}/reasoningEngines/{}",
            self.project_id, self.location, self.engine_id
        )
    }

    pub fn sessions_url(&self) -> String {
        format!(
            "{}/{}/sessions",
            self.sessions_api_base.trim_end_matches('/'),
            self.engine_resource()
        )
    }

    pub fn stream_query_url(&self) -> String {
        format!(
            "{}/{}:streamQuery?alt=sse",
            self.query_api_base.trim_end_matches('/'),
            self.engine_resource()
        )
    }
}

/// Returns the final path segment of a session resource name.
pub fn session_id_from_name(name: &str) -> Option<&str> {
    name.rsplit('/').next().filter(|segment| !segment.is_empty())
}

/// The operations the service needs from a conversational agent backend.
#[async_trait]
pub trait AgentEngine: Send + Sync {
    /// Creates a remote session for `user_id` and returns its opaque id.
    ///
    /// The session lives on the remote backend; nothing is stored locally.
    async fn create_session(&self, user_id: &str) -> Result<String, AgentError>;

    /// Sends one user turn and returns every text fragment of the reply, in stream order.
    async fn run_query(
        &self,
        question: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<Vec<String>, AgentError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionRequest<'a> {
    user_id: &'a str,
}

#[derive(Deserialize)]
struct CreateSessionResponse {
    name: Option<String>,
}

#[derive(Serialize)]
struct StreamQueryRequest<'a> {
    class_method: &'static str,
    input: StreamQueryInput<'a>,
}

#[derive(Serialize)]
struct StreamQueryInput<'a> {
    message: &'a str,
    user_id: &'a str,
}

/// `AgentEngine` implementation for a hosted reasoning engine reached over HTTPS.
pub struct ReasoningEngineClient {
    client: reqwest::Client,
    config: AgentEngineConfig,
    tokens: Arc<dyn TokenProvider>,
}

impl ReasoningEngineClient {
    pub fn new(config: AgentEngineConfig, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            tokens,
        }
    }

    async fn stream_query(&self, question: &str, user_id: &str) -> Result<Vec<String>, AgentError> {
        let token = self.tokens.get_token().await?;
        let payload = StreamQueryRequest {
            class_method: "stream_query",
            input: StreamQueryInput {
                message: question,
                user_id,
            },
        };

        let response = self
            .client
            .post(self.config.stream_query_url())
            .header(AUTHORIZATION, token.header_value())
            .header(ACCEPT, "text/event-stream")
            .json(&payload)
            .send()
            .await
            .map_err(|e| AgentError::AgentRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::AgentRequest(format!(
                "stream endpoint returned {}: {}",
                status, body
            )));
        }

        let reader = sse::body_reader(Box::pin(response.bytes_stream()));
        sse::collect_stream_texts(reader, self.config.line_timeout).await
    }

    async fn open_session(&self, user_id: &str) -> Result<String, AgentError> {
        let token = self.tokens.get_token().await?;

        let response = self
            .client
            .post(self.config.sessions_url())
            .header(AUTHORIZATION, token.header_value())
            .json(&CreateSessionRequest { user_id })
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|e| AgentError::SessionCreate(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::SessionCreate(format!(
                "session endpoint returned {}: {}",
                status, body
            )));
        }

        let body: CreateSessionResponse = response
            .json()
            .await
            .map_err(|e| AgentError::SessionCreate(format!("invalid response body: {}", e)))?;
        let name = body.name.ok_or_else(|| {
            AgentError::SessionCreate("session id not found in response".to_string())
        })?;
        let session_id = session_id_from_name(&name)
            .ok_or_else(|| {
                AgentError::SessionCreate(format!("session name '{}' has no id segment", name))
            })?
            .to_string();

        info!(user_id, session_id = %session_id, "Created agent session");
        Ok(session_id)
    }
}

#[async_trait]
impl AgentEngine for ReasoningEngineClient {
    async fn create_session(&self, user_id: &str) -> Result<String, AgentError> {
        tokio::time::timeout(self.config.request_timeout, self.open_session(user_id))
            .await
            .map_err(|_| {
                AgentError::SessionCreate(format!(
                    "session was not created within {}s",
                    self.config.request_timeout.as_secs_f64()
                ))
            })?
    }

    async fn run_query(
        &self,
        question: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<Vec<String>, AgentError> {
        // The stream endpoint is keyed by user only.
        debug!(user_id, session_id, "Running agent query");
        let fragments = tokio::time::timeout(
            self.config.request_timeout,
            self.stream_query(question, user_id),
        )
        .await
        .map_err(|_| {
            AgentError::AgentStream(format!(
                "agent query did not complete within {}s",
                self.config.request_timeout.as_secs_f64()
            ))
        })??;

        info!(user_id, fragments = fragments.len(), "Agent query completed");
        Ok(fragments)
    }
}

/// A deterministic `AgentEngine` for development and integration testing.
///
/// Sessions are named after the user and every query is answered with an
/// acknowledgement of the question.
pub struct MockAgentEngine;

#[async_trait]
impl AgentEngine for MockAgentEngine {
    async fn create_session(&self, user_id: &str) -> Result<String, AgentError> {
        Ok(format!("mock-session-{}", user_id))
    }

    async fn run_query(
        &self,
        question: &str,
        _user_id: &str,
        _session_id: &str,
    ) -> Result<Vec<String>, AgentError> {
        Ok(vec!["I heard you say: ".to_string(), question.to_string()])
    }
}
