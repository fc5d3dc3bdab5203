mod config;
mod frame;
mod llm;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = config::AppConfig::from_env().expect("invalid configuration");

    let llm = llm::OpenAiClient::new(&config.llm).expect("LLM client init failed");
    tracing::info!(api_base = %config.llm.api_base, "LLM client initialized");

    let state = state::AppState::new(Arc::new(llm), config.event_buffer);

    // Non-fatal: an unreachable upstream leaves the catalog empty until refreshed.
    services::catalog::refresh(&state.session, state.llm.as_ref()).await;

    let app = routes::app(state, config.static_dir.clone());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, "fanchat listening");
    axum::serve(listener, app).await.expect("server failed");
}
