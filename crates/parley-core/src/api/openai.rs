use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{self, header};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::error::{ApiError, StreamError};
use crate::api::provider::{
    AssistantContent, CompletionResponse, CompletionStream, ModelMessage, Provider, StreamChunk,
};
use crate::api::sse::{SseEvent, parse_sse_stream};
use crate::api::util::normalize_chat_url;
use parley_tools::{ToolCall, ToolSchema};

pub const PROVIDER_NAME: &str = "openai";
pub const DEFAULT_API_URL: &str = "https://api-inference.modelscope.cn/v1";

/// Streaming client for OpenAI-compatible `/chat/completions` gateways.
#[derive(Clone)]
pub struct OpenAIChatClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl OpenAIChatClient {
    pub fn new(
        api_key: &str,
        base_url: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let mut headers = header::HeaderMap::new();
        let mut auth = header::HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| ApiError::Configuration("Invalid API key format".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url: normalize_chat_url(base_url, DEFAULT_API_URL),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.base_url
    }

    fn convert_message(message: ModelMessage) -> OpenAIMessage {
        match message {
            ModelMessage::System { content } => OpenAIMessage::System { content },
            ModelMessage::User { content } => OpenAIMessage::User { content },
            ModelMessage::Assistant { content } => {
                let mut text = String::new();
                let mut tool_calls = Vec::new();
                for block in content {
                    match block {
                        AssistantContent::Text { text: t } => text.push_str(&t),
                        AssistantContent::ToolCall { tool_call } => {
                            tool_calls.push(OpenAIToolCall {
                                id: tool_call.id,
                                tool_type: "function".to_string(),
                                function: OpenAIFunctionCall {
                                    name: tool_call.name,
                                    arguments: tool_call.parameters.to_string(),
                                },
                            });
                        }
                    }
                }
                OpenAIMessage::Assistant {
                    content: if text.is_empty() { None } else { Some(text) },
                    tool_calls: if tool_calls.is_empty() {
                        None
                    } else {
                        Some(tool_calls)
                    },
                }
            }
            ModelMessage::Tool {
                tool_call_id,
                content,
            } => OpenAIMessage::Tool {
                content,
                tool_call_id,
            },
        }
    }

    fn build_request(
        model: &str,
        messages: Vec<ModelMessage>,
        tools: Option<Vec<ToolSchema>>,
    ) -> OpenAIRequest {
        let tools = tools.filter(|t| !t.is_empty()).map(|tools| {
            tools
                .into_iter()
                .map(|tool| OpenAITool {
                    tool_type: "function".to_string(),
                    function: OpenAIFunction {
                        name: tool.name,
                        description: tool.description,
                        parameters: tool.input_schema.to_json(),
                    },
                })
                .collect()
        });

        OpenAIRequest {
            model: model.to_string(),
            messages: messages.into_iter().map(Self::convert_message).collect(),
            stream: true,
            tools,
        }
    }

    fn convert_openai_stream(
        mut sse_stream: impl futures::Stream<Item = Result<SseEvent, crate::api::SseParseError>>
        + Unpin
        + Send
        + 'static,
        token: CancellationToken,
    ) -> impl futures::Stream<Item = StreamChunk> + Send + 'static {
        async_stream::stream! {
            let mut state = StreamState::default();
            loop {
                if token.is_cancelled() {
                    yield StreamChunk::Error(StreamError::Cancelled);
                    break;
                }

                let event_result = tokio::select! {
                    biased;
                    () = token.cancelled() => {
                        yield StreamChunk::Error(StreamError::Cancelled);
                        break;
                    }
                    event = sse_stream.next() => event
                };

                let Some(event_result) = event_result else {
                    // Some gateways close the stream without a [DONE] marker
                    debug!(target: "openai::chat::stream", "Stream ended without [DONE]");
                    yield StreamChunk::MessageComplete(state.finish());
                    break;
                };

                let event = match event_result {
                    Ok(e) => e,
                    Err(e) => {
                        yield StreamChunk::Error(StreamError::SseParse(e));
                        break;
                    }
                };

                if event.data.trim() == "[DONE]" {
                    yield StreamChunk::MessageComplete(state.finish());
                    break;
                }

                if let Ok(envelope) = serde_json::from_str::<OpenAIErrorEnvelope>(&event.data) {
                    warn!(
                        target: "openai::chat::stream",
                        "Upstream reported error mid-stream: {}",
                        envelope.error.message
                    );
                    yield StreamChunk::Error(StreamError::Provider {
                        provider: PROVIDER_NAME.to_string(),
                        message: envelope.error.message,
                    });
                    break;
                }

                let chunk: OpenAIStreamChunk = match serde_json::from_str(&event.data) {
                    Ok(c) => c,
                    Err(e) => {
                        debug!(
                            target: "openai::chat::stream",
                            "Failed to parse chunk: {} data: {}",
                            e,
                            event.data
                        );
                        continue;
                    }
                };

                let Some(choice) = chunk.choices.into_iter().next() else {
                    continue;
                };

                if let Some(text_delta) = choice.delta.content.filter(|t| !t.is_empty()) {
                    state.push_text(&text_delta);
                    yield StreamChunk::TextDelta(text_delta);
                }

                for tc in choice.delta.tool_calls.unwrap_or_default() {
                    for chunk in state.push_tool_call_delta(tc) {
                        yield chunk;
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Provider for OpenAIChatClient {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn stream_complete(
        &self,
        model: &str,
        messages: Vec<ModelMessage>,
        tools: Option<Vec<ToolSchema>>,
        token: CancellationToken,
    ) -> Result<CompletionStream, ApiError> {
        let request = Self::build_request(model, messages, tools);

        let send = self.http_client.post(&self.base_url).json(&request).send();
        let response = tokio::select! {
            biased;
            () = token.cancelled() => {
                return Err(ApiError::Cancelled { provider: PROVIDER_NAME.to_string() });
            }
            response = send => response.map_err(|e| {
                if e.is_timeout() {
                    ApiError::Timeout { provider: PROVIDER_NAME.to_string() }
                } else {
                    ApiError::Network(e)
                }
            })?
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            debug!(
                target: "openai::chat::stream",
                "API error status={} body={}", status, body
            );
            return Err(ApiError::from_status(PROVIDER_NAME, status.as_u16(), body));
        }

        let sse_stream = parse_sse_stream(response.bytes_stream());
        Ok(Box::pin(Self::convert_openai_stream(sse_stream, token)))
    }
}

struct ToolCallAccumulator {
    id: String,
    name: String,
    args: String,
}

/// Assembles streamed text and index-keyed tool-call fragments in arrival order.
#[derive(Default)]
struct StreamState {
    content: Vec<AssistantContent>,
    tool_call_indices: Vec<Option<usize>>,
    tool_calls: HashMap<usize, ToolCallAccumulator>,
    tool_calls_started: HashSet<usize>,
}

impl StreamState {
    fn push_text(&mut self, delta: &str) {
        match self.content.last_mut() {
            Some(AssistantContent::Text { text }) => text.push_str(delta),
            _ => {
                self.content.push(AssistantContent::Text {
                    text: delta.to_string(),
                });
                self.tool_call_indices.push(None);
            }
        }
    }

    fn push_tool_call_delta(&mut self, tc: OpenAIStreamToolCall) -> Vec<StreamChunk> {
        let mut out = Vec::new();

        if !self.tool_calls.contains_key(&tc.index) {
            self.content.push(AssistantContent::ToolCall {
                tool_call: ToolCall {
                    name: String::new(),
                    parameters: serde_json::Value::Null,
                    id: String::new(),
                },
            });
            self.tool_call_indices.push(Some(tc.index));
        }
        let entry = self
            .tool_calls
            .entry(tc.index)
            .or_insert_with(|| ToolCallAccumulator {
                id: String::new(),
                name: String::new(),
                args: String::new(),
            });

        if let Some(id) = tc.id.filter(|id| !id.is_empty()) {
            entry.id = id;
        }
        let (name, args) = match tc.function {
            Some(f) => (f.name, f.arguments),
            None => (None, None),
        };
        if let Some(name) = name.filter(|n| !n.is_empty()) {
            entry.name = name;
        }
        let args = args.unwrap_or_default();
        entry.args.push_str(&args);

        let started = self.tool_calls_started.contains(&tc.index);
        if !started && !entry.id.is_empty() && !entry.name.is_empty() {
            self.tool_calls_started.insert(tc.index);
            out.push(StreamChunk::ToolUseStart {
                id: entry.id.clone(),
                name: entry.name.clone(),
            });
            // Flush anything buffered before the id and name were known
            if !entry.args.is_empty() {
                out.push(StreamChunk::ToolUseInputDelta {
                    id: entry.id.clone(),
                    delta: entry.args.clone(),
                });
            }
        } else if started && !args.is_empty() {
            out.push(StreamChunk::ToolUseInputDelta {
                id: entry.id.clone(),
                delta: args,
            });
        }

        out
    }

    fn finish(&mut self) -> CompletionResponse {
        let content = std::mem::take(&mut self.content);
        let indices = std::mem::take(&mut self.tool_call_indices);
        let tool_calls = std::mem::take(&mut self.tool_calls);
        let mut final_content = Vec::with_capacity(content.len());

        for (block, tool_index) in content.into_iter().zip(indices) {
            let Some(index) = tool_index else {
                final_content.push(block);
                continue;
            };
            let Some(tool_call) = tool_calls.get(&index) else {
                continue;
            };
            if tool_call.id.is_empty() || tool_call.name.is_empty() {
                debug!(
                    target: "openai::chat::stream",
                    "Skipping tool call with missing id/name: id='{}' name='{}'",
                    tool_call.id,
                    tool_call.name
                );
                continue;
            }
            let parameters = if tool_call.args.trim().is_empty() {
                serde_json::Value::Object(serde_json::Map::new())
            } else {
                serde_json::from_str(&tool_call.args).unwrap_or_else(|e| {
                    warn!(
                        target: "openai::chat::stream",
                        tool_id = %tool_call.id,
                        "Tool call arguments are not valid JSON: {}", e
                    );
                    serde_json::Value::String(tool_call.args.clone())
                })
            };
            final_content.push(AssistantContent::ToolCall {
                tool_call: ToolCall {
                    id: tool_call.id.clone(),
                    name: tool_call.name.clone(),
                    parameters,
                },
            });
        }

        CompletionResponse {
            content: final_content,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
enum OpenAIMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<OpenAIToolCall>>,
    },
    Tool {
        content: String,
        tool_call_id: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIToolCall {
    id: String,
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAIFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIFunctionCall {
    name: String,
    arguments: String, // JSON string
}

#[derive(Debug, Serialize)]
struct OpenAITool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAIFunction,
}

#[derive(Debug, Serialize)]
struct OpenAIFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIStreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct OpenAIStreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OpenAIStreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamToolCall {
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<OpenAIStreamFunction>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorEnvelope {
    error: OpenAIErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::pin::pin;

    fn event(data: &str) -> Result<SseEvent, crate::api::SseParseError> {
        Ok(SseEvent {
            event_type: None,
            data: data.to_string(),
            id: None,
        })
    }

    #[tokio::test]
    async fn test_convert_openai_stream_text_deltas() {
        let events = vec![
            event(
                r#"{"id":"chatcmpl-123","object":"chat.completion.chunk","choices":[{"index":0,"delta":{"content":"Hello"},"finish_reason":null}]}"#,
            ),
            event(
                r#"{"id":"chatcmpl-123","object":"chat.completion.chunk","choices":[{"index":0,"delta":{"content":" world"},"finish_reason":null}]}"#,
            ),
            event("[DONE]"),
        ];

        let token = CancellationToken::new();
        let mut stream = pin!(OpenAIChatClient::convert_openai_stream(
            stream::iter(events),
            token
        ));

        let first_delta = stream.next().await.unwrap();
        assert!(matches!(first_delta, StreamChunk::TextDelta(ref t) if t == "Hello"));

        let second_delta = stream.next().await.unwrap();
        assert!(matches!(second_delta, StreamChunk::TextDelta(ref t) if t == " world"));

        let complete = stream.next().await.unwrap();
        if let StreamChunk::MessageComplete(response) = complete {
            assert_eq!(response.extract_text(), "Hello world");
            assert!(!response.has_tool_calls());
        } else {
            panic!("Expected MessageComplete");
        }
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_convert_openai_stream_with_tool_calls() {
        let events = vec![
            event(
                r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_abc","function":{"name":"weather","arguments":""}}]}}]}"#,
            ),
            event(
                r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"loc"}}]}}]}"#,
            ),
            event(
                r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"ation\":\"NYC\"}"}}]}}]}"#,
            ),
            event("[DONE]"),
        ];

        let token = CancellationToken::new();
        let mut stream = pin!(OpenAIChatClient::convert_openai_stream(
            stream::iter(events),
            token
        ));

        let tool_start = stream.next().await.unwrap();
        assert!(
            matches!(tool_start, StreamChunk::ToolUseStart { ref id, ref name } if id == "call_abc" && name == "weather")
        );

        let arg_delta_1 = stream.next().await.unwrap();
        assert!(
            matches!(arg_delta_1, StreamChunk::ToolUseInputDelta { ref delta, .. } if delta == "{\"loc")
        );

        let arg_delta_2 = stream.next().await.unwrap();
        assert!(
            matches!(arg_delta_2, StreamChunk::ToolUseInputDelta { ref delta, .. } if delta == "ation\":\"NYC\"}")
        );

        let complete = stream.next().await.unwrap();
        if let StreamChunk::MessageComplete(response) = complete {
            let calls = response.extract_tool_calls();
            assert_eq!(calls.len(), 1);
            assert_eq!(calls[0].name, "weather");
            assert_eq!(calls[0].id, "call_abc");
            assert_eq!(calls[0].parameters, serde_json::json!({"location": "NYC"}));
        } else {
            panic!("Expected MessageComplete");
        }
    }

    #[tokio::test]
    async fn test_convert_openai_stream_without_done_marker() {
        let events = vec![event(
            r#"{"choices":[{"index":0,"delta":{"content":"partial"}}]}"#,
        )];

        let token = CancellationToken::new();
        let mut stream = pin!(OpenAIChatClient::convert_openai_stream(
            stream::iter(events),
            token
        ));

        assert!(matches!(stream.next().await.unwrap(), StreamChunk::TextDelta(_)));
        assert!(
            matches!(stream.next().await.unwrap(), StreamChunk::MessageComplete(ref r) if r.extract_text() == "partial")
        );
    }

    #[tokio::test]
    async fn test_convert_openai_stream_error_envelope() {
        let events = vec![event(r#"{"error":{"message":"model overloaded"}}"#)];

        let token = CancellationToken::new();
        let mut stream = pin!(OpenAIChatClient::convert_openai_stream(
            stream::iter(events),
            token
        ));

        let chunk = stream.next().await.unwrap();
        assert!(
            matches!(chunk, StreamChunk::Error(StreamError::Provider { ref message, .. }) if message == "model overloaded")
        );
    }

    #[tokio::test]
    async fn test_convert_openai_stream_cancellation() {
        let events = vec![event(
            r#"{"choices":[{"index":0,"delta":{"content":"Hello"}}]}"#,
        )];

        let token = CancellationToken::new();
        token.cancel();

        let mut stream = pin!(OpenAIChatClient::convert_openai_stream(
            stream::iter(events),
            token
        ));

        let cancelled = stream.next().await.unwrap();
        assert!(matches!(
            cancelled,
            StreamChunk::Error(StreamError::Cancelled)
        ));
    }

    #[test]
    fn test_build_request_serializes_tools_and_history() {
        let messages = vec![
            ModelMessage::System {
                content: "be brief".to_string(),
            },
            ModelMessage::User {
                content: "weather in Oslo?".to_string(),
            },
            ModelMessage::Assistant {
                content: vec![AssistantContent::ToolCall {
                    tool_call: ToolCall {
                        name: "weather".to_string(),
                        parameters: serde_json::json!({"location": "Oslo"}),
                        id: "call_1".to_string(),
                    },
                }],
            },
            ModelMessage::Tool {
                tool_call_id: "call_1".to_string(),
                content: r#"{"location":"Oslo","temperature":40}"#.to_string(),
            },
        ];
        let tools = vec![ToolSchema {
            name: "weather".to_string(),
            display_name: "Weather".to_string(),
            description: "Get the weather in a location (fahrenheit)".to_string(),
            input_schema: parley_tools::InputSchema {
                properties: serde_json::Map::new(),
                required: vec![],
                schema_type: "object".to_string(),
            },
        }];

        let request = OpenAIChatClient::build_request("m", messages, Some(tools));
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][2]["role"], "assistant");
        assert!(json["messages"][2]["content"].is_null());
        assert_eq!(
            json["messages"][2]["tool_calls"][0]["function"]["arguments"],
            r#"{"location":"Oslo"}"#
        );
        assert_eq!(json["messages"][3]["tool_call_id"], "call_1");
        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["tools"][0]["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn test_build_request_omits_empty_tools() {
        let request = OpenAIChatClient::build_request("m", vec![], Some(vec![]));
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("tools").is_none());
    }

    #[tokio::test]
    #[ignore = "requires PARLEY_API_KEY and network access"]
    async fn test_stream_complete_real_api() {
        dotenvy::dotenv().ok();
        let api_key = std::env::var("PARLEY_API_KEY").unwrap();
        let client =
            OpenAIChatClient::new(&api_key, None, Duration::from_secs(60)).unwrap();
        let mut stream = client
            .stream_complete(
                "deepseek-ai/DeepSeek-V3.2",
                vec![ModelMessage::User {
                    content: "Say hi".to_string(),
                }],
                None,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        let mut completed = false;
        while let Some(chunk) = stream.next().await {
            if matches!(chunk, StreamChunk::MessageComplete(_)) {
                completed = true;
            }
        }
        assert!(completed);
    }
}
