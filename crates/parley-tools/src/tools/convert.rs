use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ToolSpec;
use crate::error::ToolExecutionError;
use crate::result::ConversionResult;

pub const CONVERT_TOOL_NAME: &str = "convertFahrenheitToCelsius";
pub(crate) const PANEL_LABEL: &str = "Conversion Result";

pub struct ConvertFahrenheitToCelsiusToolSpec;

impl ToolSpec for ConvertFahrenheitToCelsiusToolSpec {
    type Params = ConvertFahrenheitToCelsiusParams;
    type Result = ConversionResult;
    type Error = ConversionError;

    const NAME: &'static str = CONVERT_TOOL_NAME;
    const DISPLAY_NAME: &'static str = "Fahrenheit to Celsius";
    const DESCRIPTION: &'static str = "Convert a temperature in fahrenheit to celsius";

    fn execution_error(error: Self::Error) -> ToolExecutionError {
        ToolExecutionError::Conversion(error)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Error, PartialEq)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ConversionError {
    #[error("temperature {value} is not a finite number")]
    NotFinite { value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConvertFahrenheitToCelsiusParams {
    /// The temperature in fahrenheit to convert
    pub temperature: f64,
}

/// `round((t - 32) * 5 / 9)`, with halves rounded toward positive infinity.
pub fn fahrenheit_to_celsius(temperature: f64) -> Result<i64, ConversionError> {
    if !temperature.is_finite() {
        return Err(ConversionError::NotFinite {
            value: temperature.to_string(),
        });
    }
    Ok(((temperature - 32.0) * 5.0 / 9.0 + 0.5).floor() as i64)
}
