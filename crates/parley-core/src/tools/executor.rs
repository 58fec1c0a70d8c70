use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::tools::registry::ToolRegistry;
use crate::tools::static_tool::StaticToolContext;
use parley_tools::{ToolCall, ToolError, ToolSchema, result::ToolResult};

/// Runs tool calls against a registry, each bounded by a timeout.
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.registry.available_schemas()
    }

    #[instrument(skip_all, fields(tool = %call.name, tool_id = %call.id))]
    pub async fn execute(
        &self,
        call: &ToolCall,
        token: CancellationToken,
    ) -> Result<ToolResult, ToolError> {
        let tool = self
            .registry
            .static_tool(&call.name)
            .ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;

        let ctx = StaticToolContext {
            tool_call_id: call.id.clone(),
            cancellation_token: token.clone(),
        };

        debug!(target: "ToolExecutor::execute", parameters = %call.parameters, "Executing tool");

        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => {
                return Err(ToolError::Cancelled(call.name.clone()));
            }
            outcome = tokio::time::timeout(
                self.timeout,
                tool.execute_erased(call.parameters.clone(), &ctx),
            ) => outcome,
        };

        match outcome {
            Ok(result) => result.map_err(|e| e.into_tool_error(&call.name)),
            Err(_) => {
                warn!(
                    target: "ToolExecutor::execute",
                    timeout_secs = self.timeout.as_secs_f64(),
                    "Tool timed out"
                );
                Err(ToolError::Timeout(call.name.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::static_tool::{StaticTool, StaticToolError};
    use async_trait::async_trait;
    use parley_tools::ToolSpec;
    use parley_tools::error::ToolExecutionError;
    use parley_tools::result::ExternalResult;
    use schemars::JsonSchema;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct SleepParams {}

    struct SleepSpec;

    impl ToolSpec for SleepSpec {
        type Params = SleepParams;
        type Result = ExternalResult;
        type Error = std::io::Error;

        const NAME: &'static str = "sleep";
        const DISPLAY_NAME: &'static str = "Sleep";
        const DESCRIPTION: &'static str = "Never returns";

        fn execution_error(error: Self::Error) -> ToolExecutionError {
            ToolExecutionError::External {
                tool_name: Self::NAME.to_string(),
                message: error.to_string(),
            }
        }
    }

    struct SleepTool;

    #[async_trait]
    impl StaticTool for SleepTool {
        type Params = SleepParams;
        type Output = ExternalResult;
        type Spec = SleepSpec;

        async fn execute(
            &self,
            _params: Self::Params,
            _ctx: &StaticToolContext,
        ) -> Result<Self::Output, StaticToolError> {
            std::future::pending::<()>().await;
            Err(StaticToolError::Cancelled)
        }
    }

    fn call(name: &str, parameters: serde_json::Value) -> ToolCall {
        ToolCall {
            name: name.to_string(),
            parameters,
            id: "call_1".to_string(),
        }
    }

    fn executor(timeout: Duration) -> ToolExecutor {
        let mut registry = ToolRegistry::builtin();
        registry.register_static(SleepTool);
        ToolExecutor::new(Arc::new(registry), timeout)
    }

    #[tokio::test]
    async fn converts_temperature() {
        let result = executor(Duration::from_secs(5))
            .execute(
                &call("convertFahrenheitToCelsius", json!({"temperature": 212})),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.to_json(), json!({"celsius": 100}));
    }

    #[tokio::test]
    async fn unknown_tool_is_rejected() {
        let err = executor(Duration::from_secs(5))
            .execute(&call("bash", json!({})), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, ToolError::UnknownTool("bash".to_string()));
    }

    #[tokio::test]
    async fn invalid_arguments_are_reported() {
        let err = executor(Duration::from_secs(5))
            .execute(
                &call("weather", json!({"city": "Oslo"})),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ToolError::InvalidParams { ref tool_name, .. } if tool_name == "weather"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_tool_times_out() {
        let err = executor(Duration::from_secs(30))
            .execute(&call("sleep", json!({})), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, ToolError::Timeout("sleep".to_string()));
    }

    #[tokio::test]
    async fn cancellation_interrupts_tool() {
        let token = CancellationToken::new();
        let exec = executor(Duration::from_secs(3600));
        let handle = {
            let token = token.clone();
            tokio::spawn(async move { exec.execute(&call("sleep", json!({})), token).await })
        };
        token.cancel();
        let err = handle.await.unwrap().unwrap_err();
        assert_eq!(err, ToolError::Cancelled("sleep".to_string()));
    }
}
