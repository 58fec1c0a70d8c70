//! UI message stream protocol: the chunk vocabulary streamed from
//! `POST /api/chat` to chat clients as server-sent events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response header identifying the stream protocol version.
pub const UI_STREAM_HEADER: &str = "x-vercel-ai-ui-message-stream";
pub const UI_STREAM_VERSION: &str = "v1";

/// Data payload of the final SSE event.
pub const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "type",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum UiChunk {
    Start {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },
    StartStep,
    TextStart {
        id: String,
    },
    TextDelta {
        id: String,
        delta: String,
    },
    TextEnd {
        id: String,
    },
    ToolInputStart {
        tool_call_id: String,
        tool_name: String,
    },
    ToolInputDelta {
        tool_call_id: String,
        input_text_delta: String,
    },
    ToolInputAvailable {
        tool_call_id: String,
        tool_name: String,
        input: Value,
    },
    ToolOutputAvailable {
        tool_call_id: String,
        output: Value,
    },
    ToolOutputError {
        tool_call_id: String,
        error_text: String,
    },
    FinishStep,
    Finish,
    Error {
        error_text: String,
    },
}

impl UiChunk {
    pub fn to_json(&self) -> String {
        // Serializing these variants cannot fail: all keys are strings
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UiChunk::Finish | UiChunk::Error { .. })
    }
}

/// Decode one SSE `data:` payload. `Ok(None)` marks the end of the stream.
pub fn decode_chunk(data: &str) -> Result<Option<UiChunk>, serde_json::Error> {
    if data.trim() == DONE_MARKER {
        return Ok(None);
    }
    serde_json::from_str(data).map(Some)
}
