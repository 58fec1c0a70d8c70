mod convert;
mod weather;

pub use convert::ConvertFahrenheitToCelsiusTool;
pub use weather::WeatherTool;
