//! Error types for the agent-engine adapter and the paraphrase service.

/// Failures surfaced by the agent-engine adapter.
///
/// None of these are retried internally; every variant is returned to the
/// immediate caller. A malformed stream line is not an error at all, it is
/// logged and skipped.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The credential source is missing or malformed, or the token exchange failed.
    #[error("authentication failed: {0}")]
    Auth(String),
    /// The session endpoint failed or returned a body without a resource name.
    #[error("failed to create agent session: {0}")]
    SessionCreate(String),
    /// The streaming request could not be established or was rejected before streaming began.
    #[error("agent request failed: {0}")]
    AgentRequest(String),
    /// The stream broke or timed out after it had started.
    #[error("agent stream failed: {0}")]
    AgentStream(String),
}

/// Failures surfaced by a `Paraphraser`.
#[derive(Debug, thiserror::Error)]
pub enum ParaphraseError {
    #[error("Text content is too short. Minimum length is 1 character.")]
    TooShort,
    #[error("Text content is too long. Maximum length is 1,000 characters.")]
    TooLong,
    #[error("paraphrase generation failed: {0}")]
    Generation(String),
}

impl ParaphraseError {
    /// Whether the error was caused by the caller's input rather than the backend.
    pub fn is_validation(&self) -> bool {
        matches!(self, ParaphraseError::TooShort | ParaphraseError::TooLong)
    }
}
