use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::State,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use imrelay_core::{ConnectionRegistry, Relay};
use serde_json::json;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

use crate::config::RelayConfig;

mod routes;

/// Server application state
pub struct AppState {
    /// Loaded configuration
    pub config: RelayConfig,
    /// Lifecycle handler over the process-wide registry
    pub relay: Relay,
}

impl AppState {
    pub fn new(config: RelayConfig) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let relay = Relay::new(registry, config.router_config())
            .with_welcome_message(config.welcome_message());
        Self { config, relay }
    }
}

/// Start the HTTP server
pub async fn start(config: RelayConfig) -> Result<()> {
    let addr = config.socket_addr()?;
    let state = Arc::new(AppState::new(config));

    let app = create_router(state);

    info!("Starting Axum HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Create the Axum router with all routes and middleware
fn create_router(state: Arc<AppState>) -> Router {
    let websocket_router = routes::websocket::router(state.clone());
    let admin_router = routes::admin::router(state.clone());

    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
        .merge(websocket_router)
        .merge(admin_router)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
}

/// Simple health check endpoint (for load balancers)
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "imrelay-server",
        "version": env!("CARGO_PKG_VERSION"),
        "online_count": state.relay.registry().online_count(),
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
