use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

use crate::app::conversation::{ChatMessage, Part, Role};
use crate::app::ui_stream::UiChunk;

/// Builds the assistant message for one in-flight request from UI chunks.
#[derive(Debug, Clone)]
pub struct AssistantDraft {
    message: ChatMessage,
    partial_inputs: HashMap<String, String>,
}

impl AssistantDraft {
    pub fn new(id: String) -> Self {
        Self {
            message: ChatMessage {
                id,
                role: Role::Assistant,
                parts: Vec::new(),
            },
            partial_inputs: HashMap::new(),
        }
    }

    pub fn message(&self) -> &ChatMessage {
        &self.message
    }

    pub fn is_empty(&self) -> bool {
        self.message.parts.is_empty()
    }

    /// Fold one chunk into the message. Returns whether the message changed.
    pub fn apply(&mut self, chunk: &UiChunk) -> bool {
        match chunk {
            UiChunk::TextDelta { delta, .. } => {
                if delta.is_empty() {
                    return false;
                }
                self.message.append_text(delta);
                true
            }
            UiChunk::ToolInputStart {
                tool_call_id,
                tool_name,
            } => self.ensure_invocation(tool_call_id, tool_name),
            UiChunk::ToolInputDelta {
                tool_call_id,
                input_text_delta,
            } => {
                let buffer = self.partial_inputs.entry(tool_call_id.clone()).or_default();
                buffer.push_str(input_text_delta);
                // Arguments appear once the accumulated text is valid JSON
                match serde_json::from_str::<Value>(buffer) {
                    Ok(value) => self.set_arguments(tool_call_id, value),
                    Err(_) => false,
                }
            }
            UiChunk::ToolInputAvailable {
                tool_call_id,
                tool_name,
                input,
            } => {
                self.partial_inputs.remove(tool_call_id);
                self.ensure_invocation(tool_call_id, tool_name);
                self.set_arguments(tool_call_id, input.clone());
                true
            }
            UiChunk::ToolOutputAvailable {
                tool_call_id,
                output,
            } => self.push_result(tool_call_id, output.clone(), false),
            UiChunk::ToolOutputError {
                tool_call_id,
                error_text,
            } => self.push_result(tool_call_id, Value::String(error_text.clone()), true),
            UiChunk::Start { .. }
            | UiChunk::StartStep
            | UiChunk::TextStart { .. }
            | UiChunk::TextEnd { .. }
            | UiChunk::FinishStep
            | UiChunk::Finish
            | UiChunk::Error { .. } => false,
        }
    }

    fn ensure_invocation(&mut self, tool_call_id: &str, tool_name: &str) -> bool {
        if self.message.has_invocation(tool_call_id) {
            return false;
        }
        self.message.parts.push(Part::ToolInvocation {
            tool_call_id: tool_call_id.to_string(),
            tool_name: tool_name.to_string(),
            arguments: Value::Null,
        });
        true
    }

    fn set_arguments(&mut self, id: &str, value: Value) -> bool {
        let slot = self.message.parts.iter_mut().find_map(|part| match part {
            Part::ToolInvocation {
                tool_call_id,
                arguments,
                ..
            } if tool_call_id == id => Some(arguments),
            _ => None,
        });
        match slot {
            Some(arguments) => {
                *arguments = value;
                true
            }
            None => false,
        }
    }

    fn push_result(&mut self, id: &str, result: Value, is_error: bool) -> bool {
        let tool_name = self.message.parts.iter().find_map(|p| match p {
            Part::ToolInvocation {
                tool_call_id,
                tool_name,
                ..
            } if tool_call_id == id => Some(tool_name.clone()),
            _ => None,
        });

        let Some(tool_name) = tool_name else {
            warn!(
                target: "AssistantDraft::apply",
                tool_call_id = id,
                "Dropping tool result without an invocation"
            );
            return false;
        };

        self.message.parts.push(Part::ToolResult {
            tool_call_id: id.to_string(),
            tool_name,
            result,
            is_error,
        });
        true
    }
}
