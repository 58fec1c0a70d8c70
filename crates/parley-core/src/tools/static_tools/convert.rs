use async_trait::async_trait;

use crate::tools::static_tool::{StaticTool, StaticToolContext, StaticToolError};
use parley_tools::ToolSpec;
use parley_tools::result::ConversionResult;
use parley_tools::tools::convert::{
    ConvertFahrenheitToCelsiusParams, ConvertFahrenheitToCelsiusToolSpec, fahrenheit_to_celsius,
};

pub struct ConvertFahrenheitToCelsiusTool;

#[async_trait]
impl StaticTool for ConvertFahrenheitToCelsiusTool {
    type Params = ConvertFahrenheitToCelsiusParams;
    type Output = ConversionResult;
    type Spec = ConvertFahrenheitToCelsiusToolSpec;

    async fn execute(
        &self,
        params: Self::Params,
        _ctx: &StaticToolContext,
    ) -> Result<Self::Output, StaticToolError> {
        let celsius = fahrenheit_to_celsius(params.temperature).map_err(|e| {
            StaticToolError::execution(ConvertFahrenheitToCelsiusToolSpec::execution_error(e))
        })?;
        Ok(ConversionResult { celsius })
    }
}
