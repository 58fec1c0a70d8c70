use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use parley_core::api::ApiError;
use parley_core::app::validation::ValidationError;
use parley_core::config::ConfigError;

pub type Result<T> = std::result::Result<T, ServerError>;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Chat run ended before streaming: {0}")]
    RunFailed(String),

    #[error("Failed to build upstream client: {0}")]
    Api(#[from] ApiError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match self {
            ServerError::Validation(err) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "Invalid request",
                    "issues": err.issues,
                })),
            )
                .into_response(),
            other => {
                // Details stay in the log; clients only see a generic message
                error!(target: "parley_server::error", error = %other, "Chat request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Internal server error" })),
                )
                    .into_response()
            }
        }
    }
}
