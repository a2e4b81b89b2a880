//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests: learner profiles,
//! usage summaries, paraphrasing, text logs and the conversational agent.
//! It uses `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use speakease_core::{ParaphraseError, paraphrase::ParaphraseDirection};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    db::NewUsage,
    models::{
        AgentTurnResponse, CreateUserPayload, ErrorResponse, LatestLogsQuery, MessageResponse,
        ParaphrasePayload, ParaphraseResponse, RunAgentPayload, STATUS_SUCCESS, SeUser,
        SessionLogsQuery, StatusMessageResponse, TextLogPayload, TextLogsResponse,
        UpdateUserPayload, UsageSummaryResponse,
    },
    state::AppState,
};

pub const RUN_AGENT_SERVICE_TYPE: &str = "run_agent";

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Unprocessable(String),
    /// A downstream service failed; the message is returned to the client.
    Upstream(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            ApiError::Conflict(message) => (StatusCode::CONFLICT, message),
            ApiError::Unprocessable(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
            ApiError::Upstream(message) => {
                error!("Upstream failure: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred.".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { message })).into_response()
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

fn user_not_found(uid: &str) -> ApiError {
    ApiError::NotFound(format!("SE User '{}' not found", uid))
}

/// Welcome message.
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service is up", body = MessageResponse)
    )
)]
pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Welcome to SpeakEase API".to_string(),
    })
}

// --- User profiles ---

/// Get a learner profile.
#[utoipa::path(
    get,
    path = "/apps/se/users/{uid}",
    responses(
        (status = 200, description = "Learner profile", body = SeUser),
        (status = 404, description = "Profile not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("uid" = String, Path, description = "Learner ID")
    )
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> Result<Json<SeUser>, ApiError> {
    let user = state
        .db
        .get_user(&uid)
        .await?
        .ok_or_else(|| user_not_found(&uid))?;
    Ok(Json(user))
}

/// Create a learner profile.
#[utoipa::path(
    post,
    path = "/apps/se/users/{uid}",
    request_body = CreateUserPayload,
    responses(
        (status = 200, description = "Profile created", body = SeUser),
        (status = 409, description = "Profile already exists", body = ErrorResponse),
        (status = 422, description = "Invalid profile", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("uid" = String, Path, description = "Learner ID")
    )
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
    Json(payload): Json<CreateUserPayload>,
) -> Result<Json<SeUser>, ApiError> {
    payload.validate().map_err(ApiError::Unprocessable)?;

    let user = state
        .db
        .create_user(&uid, &payload)
        .await?
        .ok_or_else(|| ApiError::Conflict(format!("SE User '{}' already exists", uid)))?;

    info!(user_id = %uid, "Created learner profile");
    Ok(Json(user))
}

/// Update part of a learner profile.
#[utoipa::path(
    put,
    path = "/apps/se/users/{uid}",
    request_body = UpdateUserPayload,
    responses(
        (status = 200, description = "Profile updated", body = SeUser),
        (status = 404, description = "Profile not found", body = ErrorResponse),
        (status = 422, description = "Invalid profile", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("uid" = String, Path, description = "Learner ID")
    )
)]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
    Json(payload): Json<UpdateUserPayload>,
) -> Result<Json<SeUser>, ApiError> {
    payload.validate().map_err(ApiError::Unprocessable)?;

    let user = state
        .db
        .update_user(&uid, &payload)
        .await?
        .ok_or_else(|| user_not_found(&uid))?;
    Ok(Json(user))
}

/// Delete a learner profile.
#[utoipa::path(
    delete,
    path = "/apps/se/users/{uid}",
    responses(
        (status = 200, description = "Profile deleted", body = MessageResponse),
        (status = 404, description = "Profile not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("uid" = String, Path, description = "Learner ID")
    )
)]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !state.db.delete_user(&uid).await? {
        return Err(user_not_found(&uid));
    }
    Ok(Json(MessageResponse {
        message: format!("SE User {} successfully deleted", uid),
    }))
}

// --- Usage ---

/// The latest usage entries for a learner, newest first.
#[utoipa::path(
    get,
    path = "/apps/se/fetch_usage_summary/{uid}",
    responses(
        (status = 200, description = "Usage summary", body = UsageSummaryResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("uid" = String, Path, description = "Learner ID")
    )
)]
pub async fn fetch_usage_summary(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> Result<Json<UsageSummaryResponse>, ApiError> {
    let usage_summary = state.db.fetch_usage_summary(&uid).await?;
    Ok(Json(UsageSummaryResponse {
        status: STATUS_SUCCESS.to_string(),
        usage_summary,
    }))
}

// --- Paraphrase ---

async fn paraphrase(
    state: &AppState,
    direction: ParaphraseDirection,
    payload: ParaphrasePayload,
) -> Result<Json<ParaphraseResponse>, ApiError> {
    let paraphrase = state
        .paraphraser
        .paraphrase(direction, &payload.text_content)
        .await
        .map_err(|e| match e {
            ParaphraseError::Generation(reason) => {
                error!(?direction, %reason, "Paraphrase generation failed");
                ApiError::Upstream("Failed to generate paraphrase".to_string())
            }
            validation => ApiError::Unprocessable(validation.to_string()),
        })?;

    Ok(Json(ParaphraseResponse {
        status: STATUS_SUCCESS.to_string(),
        paraphrase,
    }))
}

/// Rewrite the learner's own text to sound more natural.
#[utoipa::path(
    post,
    path = "/apps/se/outgoing_paraphrase",
    request_body = ParaphrasePayload,
    responses(
        (status = 200, description = "Paraphrased text", body = ParaphraseResponse),
        (status = 422, description = "Text is empty or too long", body = ErrorResponse),
        (status = 500, description = "Generation failed", body = ErrorResponse)
    )
)]
pub async fn outgoing_paraphrase(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ParaphrasePayload>,
) -> Result<Json<ParaphraseResponse>, ApiError> {
    paraphrase(&state, ParaphraseDirection::Outgoing, payload).await
}

/// Rewrite text addressed to the learner so it is plain and literal.
#[utoipa::path(
    post,
    path = "/apps/se/incoming_paraphrase",
    request_body = ParaphrasePayload,
    responses(
        (status = 200, description = "Paraphrased text", body = ParaphraseResponse),
        (status = 422, description = "Text is empty or too long", body = ErrorResponse),
        (status = 500, description = "Generation failed", body = ErrorResponse)
    )
)]
pub async fn incoming_paraphrase(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ParaphrasePayload>,
) -> Result<Json<ParaphraseResponse>, ApiError> {
    paraphrase(&state, ParaphraseDirection::Incoming, payload).await
}

// --- Text logs ---

/// Append a text log to a session.
#[utoipa::path(
    post,
    path = "/apps/se/text_logs/{uid}/{session_id}",
    request_body = TextLogPayload,
    responses(
        (status = 200, description = "Text log stored", body = StatusMessageResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("uid" = String, Path, description = "Learner ID"),
        ("session_id" = String, Path, description = "Practice session ID")
    )
)]
pub async fn add_text_log(
    State(state): State<Arc<AppState>>,
    Path((uid, session_id)): Path<(String, String)>,
    Json(payload): Json<TextLogPayload>,
) -> Result<Json<StatusMessageResponse>, ApiError> {
    state
        .db
        .add_text_log(&uid, &session_id, payload.text_type(), &payload.text_content)
        .await?;
    Ok(Json(StatusMessageResponse::success(
        "Text log added successfully",
    )))
}

/// All text logs of a session, oldest first.
#[utoipa::path(
    get,
    path = "/apps/se/text_logs/{uid}/{session_id}",
    responses(
        (status = 200, description = "Session text logs", body = TextLogsResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("uid" = String, Path, description = "Learner ID"),
        ("session_id" = String, Path, description = "Practice session ID"),
        SessionLogsQuery
    )
)]
pub async fn get_session_text_logs(
    State(state): State<Arc<AppState>>,
    Path((uid, session_id)): Path<(String, String)>,
    Query(query): Query<SessionLogsQuery>,
) -> Result<Json<TextLogsResponse>, ApiError> {
    let logs = state
        .db
        .get_session_text_logs(&uid, &session_id, query.text_type.as_deref())
        .await?;
    Ok(Json(TextLogsResponse {
        status: STATUS_SUCCESS.to_string(),
        logs,
    }))
}

/// A learner's most recent text logs across sessions, newest first.
#[utoipa::path(
    get,
    path = "/apps/se/latest_text_logs/{uid}",
    responses(
        (status = 200, description = "Latest text logs", body = TextLogsResponse),
        (status = 400, description = "Invalid limit", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("uid" = String, Path, description = "Learner ID"),
        LatestLogsQuery
    )
)]
pub async fn get_latest_text_logs(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
    Query(query): Query<LatestLogsQuery>,
) -> Result<Json<TextLogsResponse>, ApiError> {
    if query.limit < 1 {
        return Err(ApiError::BadRequest(
            "limit must be at least 1".to_string(),
        ));
    }
    let logs = state.db.get_latest_text_logs(&uid, query.limit).await?;
    Ok(Json(TextLogsResponse {
        status: STATUS_SUCCESS.to_string(),
        logs,
    }))
}

// --- Agent ---

/// Open a new conversation with the hosted agent.
#[utoipa::path(
    post,
    path = "/apps/se/initialize_session/{uid}/{session_id}",
    responses(
        (status = 200, description = "Agent session created; message is its id", body = StatusMessageResponse),
        (status = 500, description = "Agent session could not be created", body = ErrorResponse)
    ),
    params(
        ("uid" = String, Path, description = "Learner ID"),
        ("session_id" = String, Path, description = "Practice session ID")
    )
)]
pub async fn initialize_session(
    State(state): State<Arc<AppState>>,
    Path((uid, session_id)): Path<(String, String)>,
) -> Result<Json<StatusMessageResponse>, ApiError> {
    let agent_session = state
        .agent_engine
        .create_session(&uid)
        .await
        .map_err(|e| ApiError::Upstream(format!("Error initializing session: {}", e)))?;

    info!(user_id = %uid, %session_id, %agent_session, "Initialized agent session");
    Ok(Json(StatusMessageResponse::success(agent_session)))
}

/// Send one question to the agent and return the text of its reply.
#[utoipa::path(
    post,
    path = "/apps/se/run_agent/{uid}/{session_id}",
    request_body = RunAgentPayload,
    responses(
        (status = 200, description = "Agent reply fragments", body = AgentTurnResponse),
        (status = 422, description = "Question is blank", body = ErrorResponse),
        (status = 500, description = "Agent call failed", body = ErrorResponse)
    ),
    params(
        ("uid" = String, Path, description = "Learner ID"),
        ("session_id" = String, Path, description = "Agent session ID")
    )
)]
pub async fn run_agent(
    State(state): State<Arc<AppState>>,
    Path((uid, session_id)): Path<(String, String)>,
    Json(payload): Json<RunAgentPayload>,
) -> Result<Json<AgentTurnResponse>, ApiError> {
    if payload.question.trim().is_empty() {
        return Err(ApiError::Unprocessable(
            "question must not be empty".to_string(),
        ));
    }

    let agent_response = state
        .agent_engine
        .run_query(&payload.question, &uid, &session_id)
        .await
        .map_err(|e| {
            ApiError::Upstream(format!("Error communicating with the agent server: {}", e))
        })?;

    let word_count = i32::try_from(payload.question.split_whitespace().count()).ok();
    let db = state.db.clone();
    tokio::spawn(async move {
        // Learners without a profile are still counted.
        let grade_level = match db.get_user(&uid).await {
            Ok(user) => user.map(|u| u.grade_level),
            Err(e) => {
                warn!(user_id = %uid, error = ?e, "Failed to record agent usage");
                return;
            }
        };
        let usage = NewUsage {
            uid: &uid,
            service_type: RUN_AGENT_SERVICE_TYPE,
            grade_level,
            essay_type: None,
            word_count,
        };
        if let Err(e) = db.log_usage(&usage).await {
            warn!(user_id = %uid, error = ?e, "Failed to record agent usage");
        }
    });

    Ok(Json(AgentTurnResponse {
        status: STATUS_SUCCESS.to_string(),
        agent_response,
    }))
}
