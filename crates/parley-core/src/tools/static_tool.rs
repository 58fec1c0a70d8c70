use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use parley_tools::error::ToolExecutionError;
use parley_tools::result::ToolResult;
use parley_tools::{ToolError, ToolSchema, ToolSpec};

#[derive(Debug, Clone)]
pub struct StaticToolContext {
    pub tool_call_id: String,
    pub cancellation_token: CancellationToken,
}

impl StaticToolContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StaticToolError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("{0}")]
    Execution(ToolExecutionError),

    #[error("Cancelled")]
    Cancelled,
}

impl StaticToolError {
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::InvalidParams(msg.into())
    }

    pub fn execution(error: ToolExecutionError) -> Self {
        Self::Execution(error)
    }

    pub fn into_tool_error(self, tool_name: &str) -> ToolError {
        match self {
            StaticToolError::InvalidParams(message) => {
                ToolError::invalid_params(tool_name, message)
            }
            StaticToolError::Execution(e) => ToolError::Execution(e),
            StaticToolError::Cancelled => ToolError::Cancelled(tool_name.to_string()),
        }
    }
}

#[async_trait]
pub trait StaticTool: Send + Sync + 'static {
    type Params: DeserializeOwned + JsonSchema + Send;
    type Output: Into<ToolResult> + Send;
    type Spec: ToolSpec<Params = Self::Params, Result = Self::Output>;

    async fn execute(
        &self,
        params: Self::Params,
        ctx: &StaticToolContext,
    ) -> Result<Self::Output, StaticToolError>;

    fn schema() -> ToolSchema
    where
        Self: Sized,
    {
        let settings = schemars::generate::SchemaSettings::draft07().with(|s| {
            s.inline_subschemas = true;
        });
        let schema_gen = settings.into_generator();
        let input_schema = schema_gen.into_root_schema_for::<Self::Params>();

        ToolSchema {
            name: <Self::Spec as ToolSpec>::NAME.to_string(),
            display_name: <Self::Spec as ToolSpec>::DISPLAY_NAME.to_string(),
            description: <Self::Spec as ToolSpec>::DESCRIPTION.to_string(),
            input_schema: input_schema.into(),
        }
    }
}

#[async_trait]
pub trait StaticToolErased: Send + Sync {
    fn name(&self) -> &'static str;
    fn schema(&self) -> ToolSchema;

    async fn execute_erased(
        &self,
        params: serde_json::Value,
        ctx: &StaticToolContext,
    ) -> Result<ToolResult, StaticToolError>;
}

#[async_trait]
impl<T> StaticToolErased for T
where
    T: StaticTool,
{
    fn name(&self) -> &'static str {
        <T::Spec as ToolSpec>::NAME
    }

    fn schema(&self) -> ToolSchema {
        T::schema()
    }

    async fn execute_erased(
        &self,
        params: serde_json::Value,
        ctx: &StaticToolContext,
    ) -> Result<ToolResult, StaticToolError> {
        let typed_params: T::Params = serde_json::from_value(params)
            .map_err(|e| StaticToolError::invalid_params(e.to_string()))?;

        if ctx.is_cancelled() {
            return Err(StaticToolError::Cancelled);
        }

        let result = self.execute(typed_params, ctx).await?;
        Ok(result.into())
    }
}
