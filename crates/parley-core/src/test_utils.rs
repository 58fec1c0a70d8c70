//! Test utilities for parley-core
//!
//! Scripted stand-ins for the upstream provider and the chat transport,
//! shared with the server and terminal crates' tests.

use async_trait::async_trait;
use futures::stream;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::api::{
    ApiError, AssistantContent, CompletionResponse, CompletionStream, ModelMessage, Provider,
    StreamChunk,
};
use crate::app::conversation::ChatMessage;
use crate::app::ui_stream::UiChunk;
use crate::client::transport::{ChatTransport, TransportError, UiChunkStream};
use crate::render::{Clipboard, ClipboardError};
use parley_tools::{ToolCall, ToolSchema};

/// One request observed by [`ScriptedProvider`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub messages: Vec<ModelMessage>,
    pub tools_offered: bool,
}

enum ScriptedResponse {
    Chunks(Vec<StreamChunk>),
    Fail(ApiError),
    /// Produce nothing until the request is cancelled.
    Stall,
}

/// Provider that replays queued responses in order.
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<ScriptedResponse>>,
    calls: Mutex<Vec<RecordedCall>>,
    cancelled: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, response: ScriptedResponse) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(response);
        }
    }

    pub fn push_chunks(&self, chunks: Vec<StreamChunk>) {
        self.push(ScriptedResponse::Chunks(chunks));
    }

    pub fn push_text(&self, text: &str) {
        self.push_chunks(vec![
            StreamChunk::TextDelta(text.to_string()),
            StreamChunk::MessageComplete(CompletionResponse {
                content: vec![AssistantContent::Text {
                    text: text.to_string(),
                }],
            }),
        ]);
    }

    pub fn push_tool_call(&self, id: &str, name: &str, parameters: serde_json::Value) {
        self.push_chunks(vec![
            StreamChunk::ToolUseStart {
                id: id.to_string(),
                name: name.to_string(),
            },
            StreamChunk::ToolUseInputDelta {
                id: id.to_string(),
                delta: parameters.to_string(),
            },
            StreamChunk::MessageComplete(CompletionResponse {
                content: vec![AssistantContent::ToolCall {
                    tool_call: ToolCall {
                        name: name.to_string(),
                        parameters,
                        id: id.to_string(),
                    },
                }],
            }),
        ]);
    }

    pub fn push_api_error(&self, error: ApiError) {
        self.push(ScriptedResponse::Fail(error));
    }

    pub fn push_stall(&self) {
        self.push(ScriptedResponse::Stall);
    }

    /// Number of stalled requests that were released by cancellation.
    pub fn cancelled(&self) -> usize {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn stream_complete(
        &self,
        model: &str,
        messages: Vec<ModelMessage>,
        tools: Option<Vec<ToolSchema>>,
        token: CancellationToken,
    ) -> Result<CompletionStream, ApiError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                model: model.to_string(),
                messages,
                tools_offered: tools.is_some_and(|t| !t.is_empty()),
            });
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(ScriptedResponse::Chunks(chunks)) => Ok(Box::pin(stream::iter(chunks))),
            Some(ScriptedResponse::Fail(error)) => Err(error),
            Some(ScriptedResponse::Stall) => {
                token.cancelled().await;
                self.cancelled.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::Cancelled {
                    provider: self.name().to_string(),
                })
            }
            None => Err(ApiError::Configuration(
                "scripted provider has no responses left".to_string(),
            )),
        }
    }
}

/// Handle used by a test to feed chunks into an open [`ChannelTransport`] request.
pub type ChunkFeed = mpsc::UnboundedSender<Result<UiChunk, TransportError>>;

/// Transport whose responses are driven by the test through channels.
///
/// Each `open` call pops the next queued receiver; the test keeps the
/// matching sender and pushes chunks at its own pace.
#[derive(Default, Clone)]
pub struct ChannelTransport {
    pending: Arc<Mutex<VecDeque<Result<UiChunkStream, TransportError>>>>,
    requests: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response and return the sender that feeds it.
    pub fn expect_request(&self) -> ChunkFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut pending) = self.pending.lock() {
            pending.push_back(Ok(Box::pin(UnboundedReceiverStream::new(rx))));
        }
        tx
    }

    /// Queue a response that fails before any chunk arrives.
    pub fn expect_failure(&self, error: TransportError) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.push_back(Err(error));
        }
    }

    /// Message lists sent so far, one entry per request.
    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChatTransport for ChannelTransport {
    async fn open(
        &self,
        messages: Vec<ChatMessage>,
        _token: CancellationToken,
    ) -> Result<UiChunkStream, TransportError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages);
        }
        self.pending
            .lock()
            .ok()
            .and_then(|mut p| p.pop_front())
            .unwrap_or(Err(TransportError::Closed))
    }
}

/// In-memory clipboard. Clones share contents, so a test can keep one and
/// hand the other to the code under test.
#[derive(Debug, Default, Clone)]
pub struct MemoryClipboard {
    contents: Arc<Mutex<Option<String>>>,
    fail: bool,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// A clipboard whose every write fails, as on a headless machine.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.contents.lock().ok().and_then(|c| c.clone())
    }
}

impl Clipboard for MemoryClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        if self.fail {
            return Err(ClipboardError("no display".to_string()));
        }
        if let Ok(mut contents) = self.contents.lock() {
            *contents = Some(text.to_string());
        }
        Ok(())
    }
}
