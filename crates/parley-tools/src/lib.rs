pub mod error;
pub mod result;
pub mod schema;
pub mod tools;

pub use error::{ToolError, ToolExecutionError};
pub use result::{ToolOutput, ToolResult};
pub use schema::{InputSchema, ToolCall, ToolSchema, ToolSpec};
