pub mod convert;
pub mod weather;

pub use convert::{CONVERT_TOOL_NAME, ConvertFahrenheitToCelsiusToolSpec};
pub use weather::{WEATHER_TOOL_NAME, WeatherToolSpec};

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// The closed set of tools shipped with Parley.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, IntoStaticStr)]
pub enum BuiltinTool {
    #[strum(serialize = "weather")]
    Weather,
    #[strum(serialize = "convertFahrenheitToCelsius")]
    ConvertFahrenheitToCelsius,
}

impl BuiltinTool {
    /// Heading shown above a tool panel.
    pub fn panel_label(self) -> &'static str {
        match self {
            BuiltinTool::Weather => weather::PANEL_LABEL,
            BuiltinTool::ConvertFahrenheitToCelsius => convert::PANEL_LABEL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;

    #[rstest]
    #[case(WEATHER_TOOL_NAME, BuiltinTool::Weather, "Weather Data")]
    #[case(
        CONVERT_TOOL_NAME,
        BuiltinTool::ConvertFahrenheitToCelsius,
        "Conversion Result"
    )]
    fn builtin_names_round_trip(
        #[case] name: &str,
        #[case] tool: BuiltinTool,
        #[case] label: &str,
    ) {
        assert_eq!(BuiltinTool::from_str(name).unwrap(), tool);
        assert_eq!(tool.to_string(), name);
        assert_eq!(tool.panel_label(), label);
    }

    #[test]
    fn unknown_name_is_rejected() {
        assert!(BuiltinTool::from_str("bash").is_err());
    }
}
