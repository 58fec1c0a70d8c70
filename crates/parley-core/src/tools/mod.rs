pub mod executor;
pub mod registry;
pub mod static_tool;
pub mod static_tools;

pub use executor::ToolExecutor;
pub use parley_tools::{ToolError, ToolSchema};
pub use registry::ToolRegistry;
pub use static_tool::{StaticTool, StaticToolContext, StaticToolErased, StaticToolError};
pub use static_tools::{ConvertFahrenheitToCelsiusTool, WeatherTool};
