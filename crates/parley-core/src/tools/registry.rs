use std::collections::HashMap;

use parley_tools::ToolSchema;

use super::static_tool::StaticToolErased;
use super::static_tools::{ConvertFahrenheitToCelsiusTool, WeatherTool};

/// Named tools offered to the model. Fixed once the server starts.
pub struct ToolRegistry {
    static_tools: HashMap<String, Box<dyn StaticToolErased>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            static_tools: HashMap::new(),
        }
    }

    /// Registry holding the weather and Fahrenheit conversion tools.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register_static(WeatherTool);
        registry.register_static(ConvertFahrenheitToCelsiusTool);
        registry
    }

    pub fn register_static<T: StaticToolErased + 'static>(&mut self, tool: T) {
        self.static_tools
            .insert(tool.name().to_string(), Box::new(tool));
    }

    /// Schemas sorted by name so the upstream request is stable.
    pub fn available_schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> =
            self.static_tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    pub fn static_tool(&self, name: &str) -> Option<&dyn StaticToolErased> {
        self.static_tools.get(name).map(|b| b.as_ref())
    }

    pub fn is_static_tool(&self, name: &str) -> bool {
        self.static_tools.contains_key(name)
    }

    pub fn static_tool_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.static_tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::static_tool::{StaticTool, StaticToolContext, StaticToolError};
    use async_trait::async_trait;
    use parley_tools::ToolSpec;
    use parley_tools::error::ToolExecutionError;
    use parley_tools::result::ExternalResult;
    use schemars::JsonSchema;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct EchoParams {
        value: String,
    }

    struct EchoSpec;

    impl ToolSpec for EchoSpec {
        type Params = EchoParams;
        type Result = ExternalResult;
        type Error = std::io::Error;

        const NAME: &'static str = "echo";
        const DISPLAY_NAME: &'static str = "Echo";
        const DESCRIPTION: &'static str = "Echo a value";

        fn execution_error(error: Self::Error) -> ToolExecutionError {
            ToolExecutionError::External {
                tool_name: Self::NAME.to_string(),
                message: error.to_string(),
            }
        }
    }

    struct EchoTool;

    #[async_trait]
    impl StaticTool for EchoTool {
        type Params = EchoParams;
        type Output = ExternalResult;
        type Spec = EchoSpec;

        async fn execute(
            &self,
            params: Self::Params,
            _ctx: &StaticToolContext,
        ) -> Result<Self::Output, StaticToolError> {
            Ok(ExternalResult {
                tool_name: "echo".to_string(),
                payload: serde_json::Value::String(params.value),
            })
        }
    }

    #[test]
    fn builtin_registry_exposes_both_tools() {
        let registry = ToolRegistry::builtin();
        assert_eq!(
            registry.static_tool_names(),
            vec!["convertFahrenheitToCelsius", "weather"]
        );

        let schemas = registry.available_schemas();
        assert_eq!(schemas[1].name, "weather");
        assert_eq!(
            schemas[1].description,
            "Get the weather in a location (fahrenheit)"
        );
        assert!(schemas[1].input_schema.properties.contains_key("location"));
        assert_eq!(
            schemas[0].input_schema.required,
            vec!["temperature".to_string()]
        );
    }

    #[tokio::test]
    async fn registered_tool_executes_through_erased_interface() {
        let mut registry = ToolRegistry::new();
        registry.register_static(EchoTool);
        assert!(registry.is_static_tool("echo"));

        let ctx = StaticToolContext {
            tool_call_id: "c".to_string(),
            cancellation_token: tokio_util::sync::CancellationToken::new(),
        };
        let tool = registry.static_tool("echo").unwrap();

        let result = tool
            .execute_erased(serde_json::json!({"value": "ping"}), &ctx)
            .await
            .unwrap();
        assert_eq!(result.to_json(), serde_json::json!("ping"));

        let err = tool
            .execute_erased(serde_json::json!({"wrong": 1}), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, StaticToolError::InvalidParams(_)));
    }
}
