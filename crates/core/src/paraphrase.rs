//! Paraphrase Service
//!
//! Rewrites a short piece of text for a young learner. Outgoing text (what
//! the learner wants to say) is made more conversational; incoming text
//! (what the learner was told) is made simple and literal.

use crate::error::ParaphraseError;
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::error;

/// Upper bound on the trimmed length of text accepted for paraphrasing, in characters.
pub const MAX_TEXT_CHARS: usize = 1000;

/// Which way the text is travelling relative to the learner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParaphraseDirection {
    /// Text the learner wrote, to be made more natural.
    Outgoing,
    /// Text addressed to the learner, to be made plain and literal.
    Incoming,
}

impl ParaphraseDirection {
    /// The name of the prompt template for this direction.
    pub fn prompt_key(&self) -> &'static str {
        match self {
            ParaphraseDirection::Outgoing => "outgoing_paraphrase",
            ParaphraseDirection::Incoming => "incoming_paraphrase",
        }
    }
}

/// Checks that the trimmed text has between 1 and `MAX_TEXT_CHARS` characters.
pub fn validate_text_content(text: &str) -> Result<(), ParaphraseError> {
    let length = text.trim().chars().count();
    if length < 1 {
        return Err(ParaphraseError::TooShort);
    }
    if length > MAX_TEXT_CHARS {
        return Err(ParaphraseError::TooLong);
    }
    Ok(())
}

/// Fills `{text_content}` in a prompt template.
pub fn render_prompt(template: &str, text: &str) -> String {
    template.replace("{text_content}", text)
}

/// Defines the contract for any service that can paraphrase text.
#[async_trait]
pub trait Paraphraser: Send + Sync {
    /// Returns the paraphrased text. Input is validated before any backend call.
    async fn paraphrase(
        &self,
        direction: ParaphraseDirection,
        text: &str,
    ) -> Result<String, ParaphraseError>;
}

/// A `Paraphraser` backed by an OpenAI-compatible chat completion API.
pub struct LLMParaphraser {
    client: Client<OpenAIConfig>,
    model: String,
    prompts: HashMap<String, String>,
}

impl LLMParaphraser {
    /// Creates a new LLM-based paraphraser.
    ///
    /// # Arguments
    ///
    /// * `config` - API configuration (API key, base URL, etc.).
    /// * `model` - Model identifier to use for generation (e.g., "gemini-1.5-flash").
    /// * `prompts` - Template strings keyed by name; must include
    ///   `"outgoing_paraphrase"` and `"incoming_paraphrase"`.
    pub fn new(config: OpenAIConfig, model: String, prompts: HashMap<String, String>) -> Self {
        Self {
            client: Client::with_config(config),
            model,
            prompts,
        }
    }
}

#[async_trait]
impl Paraphraser for LLMParaphraser {
    async fn paraphrase(
        &self,
        direction: ParaphraseDirection,
        text: &str,
    ) -> Result<String, ParaphraseError> {
        validate_text_content(text)?;

        let template = self.prompts.get(direction.prompt_key()).ok_or_else(|| {
            ParaphraseError::Generation(format!(
                "Missing prompt template: '{}'",
                direction.prompt_key()
            ))
        })?;
        let prompt = render_prompt(template, text);

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()
                    .map_err(|e| ParaphraseError::Generation(e.to_string()))?
                    .into(),
            ])
            .build()
            .map_err(|e| ParaphraseError::Generation(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            error!(?direction, error = %e, "Error generating paraphrase");
            ParaphraseError::Generation(e.to_string())
        })?;

        let answer = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .map(str::trim)
            .unwrap_or_default();

        if answer.is_empty() {
            error!(?direction, "No response text received from the model");
            return Err(ParaphraseError::Generation(
                "No response text received".to_string(),
            ));
        }

        Ok(answer.to_string())
    }
}

/// A mock `Paraphraser` for development and integration testing.
///
/// Validates input like the real service and echoes it back with a marker
/// for the direction.
pub struct MockParaphraser;

#[async_trait]
impl Paraphraser for MockParaphraser {
    async fn paraphrase(
        &self,
        direction: ParaphraseDirection,
        text: &str,
    ) -> Result<String, ParaphraseError> {
        validate_text_content(text)?;
        let marker = match direction {
            ParaphraseDirection::Outgoing => "Say it better",
            ParaphraseDirection::Incoming => "Explain it to me",
        };
        Ok(format!("{}: {}", marker, text.trim()))
    }
}
