use async_trait::async_trait;
use rand::Rng;

use crate::tools::static_tool::{StaticTool, StaticToolContext, StaticToolError};
use parley_tools::result::WeatherResult;
use parley_tools::tools::weather::{
    MAX_TEMPERATURE_F, MIN_TEMPERATURE_F, WeatherParams, WeatherToolSpec,
};

/// Reports a simulated Fahrenheit reading for any location.
pub struct WeatherTool;

#[async_trait]
impl StaticTool for WeatherTool {
    type Params = WeatherParams;
    type Output = WeatherResult;
    type Spec = WeatherToolSpec;

    async fn execute(
        &self,
        params: Self::Params,
        _ctx: &StaticToolContext,
    ) -> Result<Self::Output, StaticToolError> {
        let temperature = rand::thread_rng().gen_range(MIN_TEMPERATURE_F..=MAX_TEMPERATURE_F);
        Ok(WeatherResult {
            location: params.location,
            temperature,
        })
    }
}
