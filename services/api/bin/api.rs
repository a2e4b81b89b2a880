//! Main Entrypoint for the SpeakEase API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing the database connection pool and running migrations.
//! 3. Initializing shared services (the agent-engine and paraphrase clients).
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use speakease_api::{
    config::{Config, CredentialSource},
    db::Db,
    router::create_router,
    state::AppState,
};
use speakease_core::{
    agent_engine::{AgentEngine, ReasoningEngineClient},
    credentials::{MetadataServerTokenProvider, ServiceAccountTokenProvider, TokenProvider},
    paraphrase::{LLMParaphraser, ParaphraseDirection, Paraphraser},
};
use sqlx::PgPool;
use std::{collections::HashMap, fs, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

/// A helper function to load prompts from a directory.
fn load_prompts(prompts_path: &std::path::Path) -> anyhow::Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();
    for entry in std::fs::read_dir(prompts_path)
        .with_context(|| format!("Could not read prompts from {}", prompts_path.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem")?
                .to_string();
            let content = fs::read_to_string(&path)?;
            prompts.insert(prompt_key, content);
        }
    }
    Ok(prompts)
}

fn token_provider(source: &CredentialSource) -> anyhow::Result<Arc<dyn TokenProvider>> {
    match source {
        CredentialSource::ServiceAccountFile(path) => {
            info!(key_file = %path.display(), "Using service-account credentials.");
            let provider = ServiceAccountTokenProvider::from_file(path)
                .context("Failed to load service-account credentials")?;
            Ok(Arc::new(provider))
        }
        CredentialSource::MetadataServer => {
            info!("Using metadata-server credentials.");
            Ok(Arc::new(MetadataServerTokenProvider::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Database ---
    let pool = PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let db = Arc::new(Db::new(pool));
    db.run_migrations().await?;
    info!("Database connection established and migrations are up-to-date.");

    // --- 4. Initialize Shared Services ---
    let prompts = load_prompts(&config.prompts_path)?;
    for direction in [ParaphraseDirection::Outgoing, ParaphraseDirection::Incoming] {
        if !prompts.contains_key(direction.prompt_key()) {
            anyhow::bail!(
                "{}.md not found in prompts directory",
                direction.prompt_key()
            );
        }
    }

    let openai_config = OpenAIConfig::new()
        .with_api_key(&config.gemini_api_key)
        .with_api_base(&config.gemini_api_base);
    let paraphraser: Arc<dyn Paraphraser> = Arc::new(LLMParaphraser::new(
        openai_config,
        config.paraphrase_model.clone(),
        prompts,
    ));

    let tokens = token_provider(&config.credential_source)?;
    let agent_engine: Arc<dyn AgentEngine> = Arc::new(ReasoningEngineClient::new(
        config.agent_engine_config(),
        tokens,
    ));

    let app_state = Arc::new(AppState {
        db,
        agent_engine,
        paraphraser,
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        model = %config.paraphrase_model,
        agent_engine = %config.agent_engine_config().engine_resource(),
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server has shut down.");
    Ok(())
}
