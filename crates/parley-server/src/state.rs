use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use parley_core::api::{OpenAIChatClient, Provider};
use parley_core::app::AgentExecutor;
use parley_core::config::ServerConfig;
use parley_core::tools::{ToolExecutor, ToolRegistry};

use crate::error::Result;

/// Shared, immutable state behind every request.
#[derive(Clone)]
pub struct AppState {
    pub executor: AgentExecutor,
    pub model: String,
    pub max_steps: usize,
}

impl AppState {
    pub fn new(
        provider: Arc<dyn Provider>,
        registry: ToolRegistry,
        model: impl Into<String>,
        max_steps: usize,
        tool_timeout: Duration,
    ) -> Self {
        let tool_executor = ToolExecutor::new(Arc::new(registry), tool_timeout);
        Self {
            executor: AgentExecutor::new(provider, tool_executor),
            model: model.into(),
            max_steps: max_steps.max(1),
        }
    }

    /// Wire the upstream client and the builtin tools from configuration.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let client = OpenAIChatClient::new(
            &config.api_key,
            config.base_url.as_deref(),
            config.request_timeout,
        )?;
        info!(
            target: "parley_server::state",
            endpoint = client.endpoint(),
            model = %config.model,
            max_steps = config.max_steps,
            "Configured upstream"
        );
        Ok(Self::new(
            Arc::new(client),
            ToolRegistry::builtin(),
            config.model.clone(),
            config.max_steps,
            config.tool_timeout,
        ))
    }
}
