use thiserror::Error;

use crate::api::ApiError;
use crate::app::agent_executor::AgentExecutorError;
use crate::app::validation::ValidationError;
use crate::client::{ControllerError, TransportError};
use crate::config::ConfigError;
use crate::render::RenderError;
use crate::tools::ToolError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    AgentExecutor(#[from] AgentExecutorError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Controller(#[from] ControllerError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Cancelled")]
    Cancelled,
}
