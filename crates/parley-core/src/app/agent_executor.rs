use std::sync::Arc;

use futures::{StreamExt, stream::FuturesUnordered};
use parley_tools::{ToolCall, ToolError};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::api::{
    ApiError, AssistantContent, CompletionResponse, ModelMessage, Provider, StreamChunk,
    StreamError,
};
use crate::app::conversation::generate_id;
use crate::app::ui_stream::UiChunk;
use crate::tools::ToolExecutor;

/// Client-facing text of an `error` chunk. Details stay in the server log.
pub const GENERIC_STREAM_ERROR: &str = "An error occurred.";

#[derive(Error, Debug)]
pub enum AgentExecutorError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("Stream error: {0}")]
    Stream(StreamError),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error("Event channel send error: {0}")]
    SendError(String),
    #[error("Operation cancelled")]
    Cancelled,
}

impl<T> From<mpsc::error::SendError<T>> for AgentExecutorError {
    fn from(err: mpsc::error::SendError<T>) -> Self {
        AgentExecutorError::SendError(err.to_string())
    }
}

pub struct AgentExecutorRunRequest {
    pub model: String,
    pub messages: Vec<ModelMessage>,
    /// Upper bound on model calls. The last permitted call is made without tools.
    pub max_steps: usize,
}

/// What a completed run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRunOutcome {
    pub message_id: String,
    pub steps: usize,
    pub text: String,
    /// Assistant and tool messages appended during the run.
    pub messages: Vec<ModelMessage>,
}

#[derive(Clone)]
pub struct AgentExecutor {
    provider: Arc<dyn Provider>,
    tool_executor: ToolExecutor,
}

impl AgentExecutor {
    pub fn new(provider: Arc<dyn Provider>, tool_executor: ToolExecutor) -> Self {
        Self {
            provider,
            tool_executor,
        }
    }

    /// Drive the model/tool loop, streaming UI chunks to `event_sender`.
    ///
    /// Failures before the `start` chunk are returned without emitting
    /// anything. Later failures emit a generic `error` chunk first.
    #[instrument(skip_all, name = "AgentExecutor::run")]
    pub async fn run(
        &self,
        request: AgentExecutorRunRequest,
        event_sender: mpsc::Sender<UiChunk>,
        token: CancellationToken,
    ) -> Result<AgentRunOutcome, AgentExecutorError> {
        let mut run = Run {
            message_id: generate_id("msg"),
            started: false,
            text_blocks: 0,
            sender: event_sender,
        };

        let result = self.run_steps(&request, &mut run, &token).await;

        if let Err(err) = &result {
            let reportable = !matches!(
                err,
                AgentExecutorError::Cancelled | AgentExecutorError::SendError(_)
            );
            if run.started && reportable {
                warn!(
                    target: "AgentExecutor::run",
                    error = %err,
                    "Run failed after streaming started"
                );
                // The receiver may already be gone; nothing more to report then
                let _ = run
                    .sender
                    .send(UiChunk::Error {
                        error_text: GENERIC_STREAM_ERROR.to_string(),
                    })
                    .await;
            }
        }

        result
    }

    async fn run_steps(
        &self,
        request: &AgentExecutorRunRequest,
        run: &mut Run,
        token: &CancellationToken,
    ) -> Result<AgentRunOutcome, AgentExecutorError> {
        let max_steps = request.max_steps.max(1);
        let schemas = self.tool_executor.schemas();
        let mut messages = request.messages.clone();
        let mut appended = Vec::new();
        let mut text = String::new();

        debug!(
            target: "AgentExecutor::run",
            model = %request.model,
            max_steps,
            "Starting completion loop"
        );

        for step in 1..=max_steps {
            if token.is_cancelled() {
                info!("Operation cancelled before API call.");
                return Err(AgentExecutorError::Cancelled);
            }

            let final_step = step == max_steps;
            let tools = if final_step || schemas.is_empty() {
                None
            } else {
                Some(schemas.clone())
            };

            info!(
                target: "AgentExecutor::run",
                model = %request.model,
                step,
                tools_offered = tools.is_some(),
                "Calling LLM API"
            );
            let stream = self
                .provider
                .stream_complete(&request.model, messages.clone(), tools, token.clone())
                .await
                .map_err(|e| match e {
                    ApiError::Cancelled { .. } => AgentExecutorError::Cancelled,
                    other => AgentExecutorError::Api(other),
                })?;

            if !run.started {
                run.started = true;
                run.send(UiChunk::Start {
                    message_id: Some(run.message_id.clone()),
                })
                .await?;
            }
            run.send(UiChunk::StartStep).await?;

            let response = run.relay_step(stream, !final_step).await?;

            let step_text = response.extract_text();
            text.push_str(&step_text);

            let tool_calls = if final_step {
                if response.has_tool_calls() {
                    warn!(
                        target: "AgentExecutor::run",
                        step,
                        "Step limit reached; ignoring requested tool calls"
                    );
                }
                Vec::new()
            } else {
                response.extract_tool_calls()
            };

            let content: Vec<AssistantContent> = response
                .content
                .into_iter()
                .filter(|c| !final_step || matches!(c, AssistantContent::Text { .. }))
                .collect();
            if !content.is_empty() {
                let assistant = ModelMessage::Assistant { content };
                messages.push(assistant.clone());
                appended.push(assistant);
            }

            if tool_calls.is_empty() {
                info!(
                    target: "AgentExecutor::run",
                    step,
                    "LLM response received, no tool calls requested."
                );
                run.send(UiChunk::FinishStep).await?;
                run.send(UiChunk::Finish).await?;
                return Ok(AgentRunOutcome {
                    message_id: run.message_id.clone(),
                    steps: step,
                    text,
                    messages: appended,
                });
            }

            info!(
                target: "AgentExecutor::run",
                step,
                count = tool_calls.len(),
                "LLM requested tool calls."
            );
            for call in &tool_calls {
                run.send(UiChunk::ToolInputAvailable {
                    tool_call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    input: call.parameters.clone(),
                })
                .await?;
            }

            let tool_messages = self.execute_tools(tool_calls, run, token).await?;
            messages.extend(tool_messages.iter().cloned());
            appended.extend(tool_messages);

            run.send(UiChunk::FinishStep).await?;
        }

        // The final step never offers tools, so the loop always returns above.
        Err(AgentExecutorError::Cancelled)
    }

    /// Run one step's tool calls concurrently, emitting outputs as they finish.
    /// Tool messages are returned in the order the model requested them.
    async fn execute_tools(
        &self,
        tool_calls: Vec<ToolCall>,
        run: &mut Run,
        token: &CancellationToken,
    ) -> Result<Vec<ModelMessage>, AgentExecutorError> {
        let mut pending: FuturesUnordered<_> = tool_calls
            .iter()
            .enumerate()
            .map(|(index, call)| {
                let executor = self.tool_executor.clone();
                let token = token.clone();
                async move {
                    let result = executor.execute(call, token).await;
                    (index, result)
                }
            })
            .collect();

        let mut slots: Vec<Option<ModelMessage>> = vec![None; tool_calls.len()];

        while let Some((index, result)) = pending.next().await {
            let call = &tool_calls[index];
            match result {
                Ok(output) => {
                    info!(
                        target: "AgentExecutor::tools",
                        tool = %call.name,
                        tool_id = %call.id,
                        result = %output.to_json(),
                        "Tool finished"
                    );
                    run.send(UiChunk::ToolOutputAvailable {
                        tool_call_id: call.id.clone(),
                        output: output.to_json(),
                    })
                    .await?;
                    slots[index] = Some(ModelMessage::Tool {
                        tool_call_id: call.id.clone(),
                        content: output.llm_format(),
                    });
                }
                Err(ToolError::Cancelled(_)) => {
                    info!("Operation cancelled during tool handling.");
                    return Err(AgentExecutorError::Cancelled);
                }
                Err(err) => {
                    warn!(
                        target: "AgentExecutor::tools",
                        tool = %call.name,
                        tool_id = %call.id,
                        error = %err,
                        "Tool failed"
                    );
                    run.send(UiChunk::ToolOutputError {
                        tool_call_id: call.id.clone(),
                        error_text: err.to_string(),
                    })
                    .await?;
                    slots[index] = Some(ModelMessage::Tool {
                        tool_call_id: call.id.clone(),
                        content: format!("Error: {err}"),
                    });
                }
            }
        }

        Ok(slots.into_iter().flatten().collect())
    }
}

/// Per-run streaming state.
struct Run {
    message_id: String,
    started: bool,
    text_blocks: usize,
    sender: mpsc::Sender<UiChunk>,
}

impl Run {
    async fn send(&self, chunk: UiChunk) -> Result<(), AgentExecutorError> {
        self.sender.send(chunk).await?;
        Ok(())
    }

    fn next_text_id(&mut self) -> String {
        self.text_blocks += 1;
        format!("{}-text-{}", self.message_id, self.text_blocks)
    }

    /// Forward one upstream stream as UI chunks and return the completed response.
    async fn relay_step(
        &mut self,
        mut stream: crate::api::CompletionStream,
        tools_enabled: bool,
    ) -> Result<CompletionResponse, AgentExecutorError> {
        let mut open_text: Option<String> = None;

        while let Some(chunk) = stream.next().await {
            match chunk {
                StreamChunk::TextDelta(delta) => {
                    let id = match &open_text {
                        Some(id) => id.clone(),
                        None => {
                            let id = self.next_text_id();
                            self.send(UiChunk::TextStart { id: id.clone() }).await?;
                            open_text = Some(id.clone());
                            id
                        }
                    };
                    self.send(UiChunk::TextDelta { id, delta }).await?;
                }
                StreamChunk::ToolUseStart { id, name } => {
                    if let Some(text_id) = open_text.take() {
                        self.send(UiChunk::TextEnd { id: text_id }).await?;
                    }
                    if tools_enabled {
                        self.send(UiChunk::ToolInputStart {
                            tool_call_id: id,
                            tool_name: name,
                        })
                        .await?;
                    }
                }
                StreamChunk::ToolUseInputDelta { id, delta } => {
                    if tools_enabled {
                        self.send(UiChunk::ToolInputDelta {
                            tool_call_id: id,
                            input_text_delta: delta,
                        })
                        .await?;
                    }
                }
                StreamChunk::MessageComplete(response) => {
                    if let Some(text_id) = open_text.take() {
                        self.send(UiChunk::TextEnd { id: text_id }).await?;
                    }
                    return Ok(response);
                }
                StreamChunk::Error(StreamError::Cancelled) => {
                    return Err(AgentExecutorError::Cancelled);
                }
                StreamChunk::Error(err) => {
                    return Err(AgentExecutorError::Stream(err));
                }
            }
        }

        Err(AgentExecutorError::Stream(StreamError::Provider {
            provider: "stream".to_string(),
            message: "stream ended before completion".to_string(),
        }))
    }
}
