use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::chat::{chat, healthz};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
