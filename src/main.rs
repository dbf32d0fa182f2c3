//! Trivaso - voice-driven guessing game
//!
//! A Rust backend hosting game sessions driven by a browser speech client.
//! Each session runs a dialogue state machine that reads clues and listens
//! for guesses.

mod api;
mod config;
mod content;
mod nlu;
mod runtime;
mod state_machine;

use api::{create_router, AppState};
use config::GameConfig;
use content::ContentStore;
use runtime::RuntimeConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trivaso=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = GameConfig::from_env();

    // Content is validated here so a bad document stops startup
    let content = match &config.content_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading content");
            ContentStore::load(path)?
        }
        None => ContentStore::builtin()?,
    };
    tracing::info!(items = content.item_count(), "Content loaded");

    let state = AppState::new(Arc::new(content), RuntimeConfig::from(&config));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(
        answer_delay_ms = u64::try_from(config.answer_delay.as_millis()).unwrap_or(u64::MAX),
        "Trivaso server listening on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
