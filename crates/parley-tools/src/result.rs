use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;

/// Core enum for all tool results
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ToolResult {
    Weather(WeatherResult),
    Conversion(ConversionResult),

    // Payload from a tool not known at compile time
    External(ExternalResult),

    // Failure (any tool)
    Error(ToolError),
}

/// Result for the weather tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherResult {
    pub location: String,
    /// Degrees Fahrenheit.
    pub temperature: i64,
}

/// Result for the Fahrenheit to Celsius conversion tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversionResult {
    pub celsius: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalResult {
    pub tool_name: String,
    pub payload: Value,
}

/// Marker trait for typed tool outputs.
pub trait ToolOutput: Serialize + Send + Sync + 'static {}

impl ToolOutput for WeatherResult {}
impl ToolOutput for ConversionResult {}
impl ToolOutput for ExternalResult {}

impl From<WeatherResult> for ToolResult {
    fn from(r: WeatherResult) -> Self {
        Self::Weather(r)
    }
}

impl From<ConversionResult> for ToolResult {
    fn from(r: ConversionResult) -> Self {
        Self::Conversion(r)
    }
}

impl From<ExternalResult> for ToolResult {
    fn from(r: ExternalResult) -> Self {
        Self::External(r)
    }
}

impl From<ToolError> for ToolResult {
    fn from(e: ToolError) -> Self {
        Self::Error(e)
    }
}

impl ToolResult {
    pub fn is_error(&self) -> bool {
        matches!(self, ToolResult::Error(_))
    }

    /// The plain-data value handed back to the model and streamed to clients.
    pub fn to_json(&self) -> Value {
        let value = match self {
            ToolResult::Weather(r) => serde_json::to_value(r),
            ToolResult::Conversion(r) => serde_json::to_value(r),
            ToolResult::External(r) => Ok(r.payload.clone()),
            ToolResult::Error(e) => Ok(Value::String(e.to_string())),
        };
        value.unwrap_or(Value::Null)
    }

    /// Text form used as the content of a model `tool` message.
    pub fn llm_format(&self) -> String {
        match self {
            ToolResult::Error(e) => format!("Error: {e}"),
            other => other.to_json().to_string(),
        }
    }
}
