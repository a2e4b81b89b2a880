//! SpeakEase Core
//!
//! Client-side adapters for the services behind the SpeakEase assistant:
//! the hosted conversational agent (sessions and streamed turns) and the
//! generative paraphrase model.

pub mod agent_engine;
pub mod credentials;
pub mod error;
pub mod extract;
pub mod paraphrase;
pub mod sse;

pub use error::{AgentError, ParaphraseError};
