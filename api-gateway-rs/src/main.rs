// api-gateway-rs/src/main.rs
// HTTP entry point for the Sysmon event browser and explanation API

use std::sync::Arc;

use api_gateway::{AppState, DEFAULT_PORT};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    config_rs::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let addr = config_rs::get_bind_address("API_GATEWAY", DEFAULT_PORT);
    let state = Arc::new(AppState::from_env());

    tracing::info!("Serving event sources from {}", state.store().logs_dir().display());
    if !state.backend_configured() {
        tracing::warn!("No backend credential set (GROQ_API_KEY); explanations will fail until it is configured");
    }

    let app = state.create_router();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("API gateway listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
