//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like the database pool and the service clients.

use crate::db::Db;
use speakease_core::{agent_engine::AgentEngine, paraphrase::Paraphraser};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Db>,
    pub agent_engine: Arc<dyn AgentEngine>,
    pub paraphraser: Arc<dyn Paraphraser>,
}
