use async_trait::async_trait;
use futures_core::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

use crate::api::error::{ApiError, StreamError};
use parley_tools::{ToolCall, ToolSchema};

/// A block of assistant output as reported by the upstream model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssistantContent {
    Text { text: String },
    ToolCall { tool_call: ToolCall },
}

/// Provider-neutral chat message sent upstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ModelMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Vec<AssistantContent>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

/// Response from the provider's completion API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CompletionResponse {
    pub content: Vec<AssistantContent>,
}

impl CompletionResponse {
    /// Extract all text content from the response
    pub fn extract_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| {
                if let AssistantContent::Text { text } = block {
                    Some(text.as_str())
                } else {
                    None
                }
            })
            .collect()
    }

    /// Check if the response contains any tool calls
    pub fn has_tool_calls(&self) -> bool {
        self.content
            .iter()
            .any(|block| matches!(block, AssistantContent::ToolCall { .. }))
    }

    pub fn extract_tool_calls(&self) -> Vec<ToolCall> {
        self.content
            .iter()
            .filter_map(|block| {
                if let AssistantContent::ToolCall { tool_call } = block {
                    Some(tool_call.clone())
                } else {
                    None
                }
            })
            .collect()
    }
}

/// Incremental output of a streamed completion.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    TextDelta(String),
    ToolUseStart { id: String, name: String },
    ToolUseInputDelta { id: String, delta: String },
    MessageComplete(CompletionResponse),
    Error(StreamError),
}

pub type CompletionStream = Pin<Box<dyn Stream<Item = StreamChunk> + Send>>;

/// Provider trait that all LLM backends must implement
#[async_trait]
pub trait Provider: Send + Sync + 'static {
    /// Get the name of the provider
    fn name(&self) -> &'static str;

    /// Open a streamed completion. The stream ends after a
    /// `MessageComplete` or an `Error` chunk.
    async fn stream_complete(
        &self,
        model: &str,
        messages: Vec<ModelMessage>,
        tools: Option<Vec<ToolSchema>>,
        token: CancellationToken,
    ) -> Result<CompletionStream, ApiError>;
}
