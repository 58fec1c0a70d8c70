use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tools::{CONVERT_TOOL_NAME, convert::ConversionError};

#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid parameters for {tool_name}: {message}")]
    InvalidParams { tool_name: String, message: String },

    #[error("{0}")]
    Execution(ToolExecutionError),

    #[error("{0} was cancelled")]
    Cancelled(String),

    #[error("{0} timed out")]
    Timeout(String),

    #[error("Unexpected error: {0}")]
    InternalError(String),
}

impl ToolError {
    pub fn execution<T: Into<String>, M: Into<String>>(tool_name: T, message: M) -> Self {
        ToolError::Execution(ToolExecutionError::External {
            tool_name: tool_name.into(),
            message: message.into(),
        })
    }

    pub fn invalid_params<T: Into<String>, M: Into<String>>(tool_name: T, message: M) -> Self {
        ToolError::InvalidParams {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Name of the tool this error concerns, if it names one.
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            ToolError::UnknownTool(name)
            | ToolError::Cancelled(name)
            | ToolError::Timeout(name) => Some(name),
            ToolError::InvalidParams { tool_name, .. } => Some(tool_name),
            ToolError::Execution(err) => Some(err.tool_name()),
            ToolError::InternalError(_) => None,
        }
    }
}

#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ToolExecutionError {
    #[error("{0}")]
    Conversion(ConversionError),

    #[error("{tool_name} failed: {message}")]
    External { tool_name: String, message: String },
}

impl ToolExecutionError {
    pub fn tool_name(&self) -> &str {
        match self {
            ToolExecutionError::Conversion(_) => CONVERT_TOOL_NAME,
            ToolExecutionError::External { tool_name, .. } => tool_name.as_str(),
        }
    }
}
