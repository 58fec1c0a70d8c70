use std::convert::Infallible;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ToolSpec;
use crate::error::ToolExecutionError;
use crate::result::WeatherResult;

pub const WEATHER_TOOL_NAME: &str = "weather";
pub(crate) const PANEL_LABEL: &str = "Weather Data";

/// Reported temperatures fall in this closed range, in degrees Fahrenheit.
pub const MIN_TEMPERATURE_F: i64 = 32;
pub const MAX_TEMPERATURE_F: i64 = 90;

pub struct WeatherToolSpec;

impl ToolSpec for WeatherToolSpec {
    type Params = WeatherParams;
    type Result = WeatherResult;
    /// Any location is accepted, including an empty one.
    type Error = Infallible;

    const NAME: &'static str = WEATHER_TOOL_NAME;
    const DISPLAY_NAME: &'static str = "Weather";
    const DESCRIPTION: &'static str = "Get the weather in a location (fahrenheit)";

    fn execution_error(error: Self::Error) -> ToolExecutionError {
        match error {}
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WeatherParams {
    /// The location to get the weather for
    pub location: String,
}
