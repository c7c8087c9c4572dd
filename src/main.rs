use axum::routing::{get, post};
use axum::Router;
use tracing_subscriber::EnvFilter;

use course_chat::api;
use course_chat::config::Config;
use course_chat::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!("LLM provider: {} ({})", config.llm.provider, config.llm.base_url);
    if let Some(fallback) = &config.fallback_llm {
        tracing::info!("Fallback provider: {} ({})", fallback.provider, fallback.base_url);
    }

    let state = AppState::load(config.clone()).await?;

    let app = Router::new()
        .route("/api/health", get(api::health))
        .route("/api/chat", post(api::chat::chat))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
