//! API and Database Models
//!
//! This module defines the core data structures used for both database mapping
//! with `sqlx` and for generating OpenAPI documentation with `utoipa`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

pub const STATUS_SUCCESS: &str = "success";
pub const DEFAULT_TEXT_TYPE: &str = "others";
pub const MIN_GRADE_LEVEL: i32 = 1;
pub const MAX_GRADE_LEVEL: i32 = 12;
pub const DEFAULT_LATEST_LOGS_LIMIT: i64 = 10;
pub const USAGE_SUMMARY_LIMIT: i64 = 20;

fn check_grade_level(grade_level: i32) -> Result<(), String> {
    if (MIN_GRADE_LEVEL..=MAX_GRADE_LEVEL).contains(&grade_level) {
        Ok(())
    } else {
        Err(format!(
            "grade_level must be between {} and {}, got {}",
            MIN_GRADE_LEVEL, MAX_GRADE_LEVEL, grade_level
        ))
    }
}

// --- User profiles ---

#[derive(Serialize, Deserialize, ToSchema, FromRow, Debug, Clone, PartialEq)]
pub struct SeUser {
    pub uid: String,
    pub first_name: String,
    pub last_name: String,
    #[schema(minimum = 1, maximum = 12)]
    pub grade_level: i32,
    pub group_ids: Vec<String>,
    #[schema(example = "en")]
    pub language: String,
    pub preferred_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, ToSchema, Debug, Clone)]
pub struct CreateUserPayload {
    #[schema(example = "Ada")]
    pub first_name: String,
    #[schema(example = "Lovelace")]
    pub last_name: String,
    #[schema(minimum = 1, maximum = 12, example = 4)]
    pub grade_level: i32,
    pub group_ids: Vec<String>,
    #[schema(example = "en")]
    pub language: String,
    #[schema(example = "visual")]
    pub preferred_type: String,
}

impl CreateUserPayload {
    pub fn validate(&self) -> Result<(), String> {
        check_grade_level(self.grade_level)
    }
}

/// A partial profile update; absent fields are left unchanged.
#[derive(Deserialize, ToSchema, Debug, Clone, Default)]
pub struct UpdateUserPayload {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[schema(minimum = 1, maximum = 12)]
    pub grade_level: Option<i32>,
    pub group_ids: Option<Vec<String>>,
    pub language: Option<String>,
    pub preferred_type: Option<String>,
}

impl UpdateUserPayload {
    pub fn validate(&self) -> Result<(), String> {
        match self.grade_level {
            Some(level) => check_grade_level(level),
            None => Ok(()),
        }
    }
}

// --- Text logs ---

#[derive(Serialize, Deserialize, ToSchema, FromRow, Debug, Clone)]
pub struct TextLog {
    pub id: i64,
    pub uid: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    #[schema(example = "others")]
    pub text_type: String,
    pub text_content: String,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct TextLogPayload {
    #[schema(example = "How was your weekend?")]
    pub text_content: String,
    #[schema(example = "others")]
    #[serde(default)]
    pub text_type: Option<String>,
}

impl TextLogPayload {
    /// The text type to store, `"others"` when the client sent none.
    pub fn text_type(&self) -> &str {
        self.text_type.as_deref().unwrap_or(DEFAULT_TEXT_TYPE)
    }
}

#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct SessionLogsQuery {
    /// Only return logs of this type.
    pub text_type: Option<String>,
}

fn default_latest_limit() -> i64 {
    DEFAULT_LATEST_LOGS_LIMIT
}

#[derive(Deserialize, IntoParams, Debug)]
#[into_params(parameter_in = Query)]
pub struct LatestLogsQuery {
    /// Number of logs to return (default 10).
    #[serde(default = "default_latest_limit")]
    pub limit: i64,
}

// --- Usage ---

#[derive(Serialize, Deserialize, ToSchema, FromRow, Debug, Clone)]
pub struct UsageEntry {
    pub timestamp: DateTime<Utc>,
    #[schema(example = "run_agent")]
    pub service_type: String,
    pub grade_level: Option<i32>,
    pub essay_type: Option<String>,
    pub word_count: Option<i32>,
}

// --- Paraphrase and agent payloads ---

#[derive(Deserialize, ToSchema, Debug)]
pub struct ParaphrasePayload {
    #[schema(example = "I like trains. Trains are fun. I like trains.")]
    pub text_content: String,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct RunAgentPayload {
    #[schema(example = "How do I ask a friend to play?")]
    pub question: String,
}

// --- Responses ---

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct StatusMessageResponse {
    #[schema(example = "success")]
    pub status: String,
    pub message: String,
}

impl StatusMessageResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct AgentTurnResponse {
    #[schema(example = "success")]
    pub status: String,
    /// Text fragments of the agent's reply, in the order they were streamed.
    pub agent_response: Vec<String>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ParaphraseResponse {
    #[schema(example = "success")]
    pub status: String,
    pub paraphrase: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct TextLogsResponse {
    #[schema(example = "success")]
    pub status: String,
    pub logs: Vec<TextLog>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct UsageSummaryResponse {
    #[schema(example = "success")]
    pub status: String,
    pub usage_summary: Vec<UsageEntry>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}
