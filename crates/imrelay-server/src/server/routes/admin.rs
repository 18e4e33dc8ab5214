//! Administrative HTTP routes: server push and presence listing.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use imrelay_core::SendResult;
use serde::Serialize;
use tracing::info;

use crate::server::AppState;

/// Create the admin router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/push/:user_id", post(push_handler))
        .route("/api/v1/online", get(online_handler))
        .with_state(state)
}

/// Response for a server push
#[derive(Debug, Serialize)]
struct PushResponse {
    delivered: bool,
    user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'static str>,
}

/// Response for the presence listing
#[derive(Debug, Serialize)]
struct OnlineResponse {
    online_count: usize,
    users: Vec<String>,
}

/// POST /api/v1/push/:user_id
///
/// Sends the raw request body to the user's connection as a text frame.
async fn push_handler(
    Path(user_id): Path<String>,
    State(state): State<Arc<AppState>>,
    body: String,
) -> impl IntoResponse {
    let result = state.relay.router().send_to(&user_id, body).await;
    info!(user_id = %user_id, result = ?result, "Admin push");

    let (status, error) = match result {
        SendResult::Sent => (StatusCode::OK, None),
        SendResult::NotConnected => (StatusCode::NOT_FOUND, Some("user not online")),
        SendResult::ChannelClosed => (StatusCode::SERVICE_UNAVAILABLE, Some("connection closed")),
    };

    (
        status,
        Json(PushResponse {
            delivered: result.is_sent(),
            user_id,
            error,
        }),
    )
}

/// GET /api/v1/online
async fn online_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let registry = state.relay.registry();
    let mut users = registry.user_ids();
    users.sort();

    Json(OnlineResponse {
        online_count: registry.online_count(),
        users,
    })
}
