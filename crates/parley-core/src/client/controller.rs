//! Client-side conversation controller.
//!
//! `ChatController` owns the transcript and the generation status. Requests
//! run on a spawned task that forwards chunks as [`StreamEvent`]s; the UI
//! loop feeds those back through [`ChatController::apply`], so every state
//! change happens on the owner's side.

use std::sync::Arc;

use futures_util::StreamExt;
use strum::Display;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::conversation::{ChatMessage, Conversation, ConversationError, Role, generate_id};
use crate::app::ui_stream::UiChunk;
use crate::client::assembler::AssistantDraft;
use crate::client::transport::{ChatTransport, TransportError};
use crate::config::{ClientConfig, ContextMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum GenerationStatus {
    Idle,
    Submitted,
    Streaming,
    Error,
}

impl GenerationStatus {
    pub fn is_in_flight(self) -> bool {
        matches!(self, GenerationStatus::Submitted | GenerationStatus::Streaming)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControllerError {
    #[error("A response is already being generated")]
    Busy,
    #[error("There is no user message to regenerate a response for")]
    NothingToRegenerate,
    #[error(transparent)]
    Conversation(#[from] ConversationError),
}

#[derive(Debug)]
pub enum StreamEventKind {
    Chunk(UiChunk),
    Failed(TransportError),
    /// The stream ended without a terminal chunk.
    Closed,
}

/// Output of a request task, tagged with the request it belongs to.
#[derive(Debug)]
pub struct StreamEvent {
    pub request_id: u64,
    pub kind: StreamEventKind,
}

struct ActiveRequest {
    id: u64,
    token: CancellationToken,
    draft: Option<AssistantDraft>,
}

pub struct ChatController {
    transport: Arc<dyn ChatTransport>,
    context_mode: ContextMode,
    conversation: Conversation,
    status: GenerationStatus,
    last_error: Option<String>,
    active: Option<ActiveRequest>,
    next_request_id: u64,
    events_tx: mpsc::UnboundedSender<StreamEvent>,
}

impl ChatController {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        config: &ClientConfig,
    ) -> (Self, mpsc::UnboundedReceiver<StreamEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let controller = Self {
            transport,
            context_mode: config.context_mode,
            conversation: Conversation::new(),
            status: GenerationStatus::Idle,
            last_error: None,
            active: None,
            next_request_id: 0,
            events_tx,
        };
        (controller, events_rx)
    }

    pub fn status(&self) -> GenerationStatus {
        self.status
    }

    pub fn is_loading(&self) -> bool {
        self.status.is_in_flight()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        self.conversation.messages()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn context_mode(&self) -> ContextMode {
        self.context_mode
    }

    pub fn set_context_mode(&mut self, mode: ContextMode) {
        self.context_mode = mode;
    }

    /// Append a user message and start a request.
    ///
    /// Returns the new message id, or `None` when the text is blank and
    /// nothing was sent.
    pub fn send_message(&mut self, text: &str) -> Result<Option<String>, ControllerError> {
        let text = text.trim();
        if text.is_empty() {
            debug!(target: "ChatController::send_message", "Ignoring blank message");
            return Ok(None);
        }
        if self.status.is_in_flight() {
            return Err(ControllerError::Busy);
        }

        let message = ChatMessage::user(text);
        let id = message.id.clone();
        self.conversation.push(message)?;
        self.start_request();
        Ok(Some(id))
    }

    /// Cancel the in-flight request, keeping whatever was already received.
    /// Returns whether anything was stopped.
    pub fn stop(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        info!(target: "ChatController::stop", request_id = active.id, "Stopping generation");
        active.token.cancel();
        self.status = GenerationStatus::Idle;
        true
    }

    /// Discard the reply to the latest user message and request a new one.
    pub fn regenerate(&mut self) -> Result<(), ControllerError> {
        if self.status.is_in_flight() {
            return Err(ControllerError::Busy);
        }
        let last_user = self
            .conversation
            .last_index_of(Role::User)
            .ok_or(ControllerError::NothingToRegenerate)?;
        self.conversation.truncate(last_user + 1);
        self.start_request();
        Ok(())
    }

    /// Replace the transcript. Any in-flight request is stopped first.
    pub fn set_messages(&mut self, messages: Vec<ChatMessage>) -> Result<(), ControllerError> {
        let conversation = Conversation::from_messages(messages)?;
        self.stop();
        self.conversation = conversation;
        self.status = GenerationStatus::Idle;
        self.last_error = None;
        Ok(())
    }

    /// Start over, keeping only system messages.
    pub fn new_topic(&mut self) {
        self.stop();
        self.conversation.retain_system();
        self.status = GenerationStatus::Idle;
        self.last_error = None;
    }

    /// Apply an event from a request task. Events for any request other than
    /// the active one are dropped.
    pub fn apply(&mut self, event: StreamEvent) {
        let is_current = self
            .active
            .as_ref()
            .is_some_and(|active| active.id == event.request_id);
        if !is_current {
            debug!(
                target: "ChatController::apply",
                request_id = event.request_id,
                "Discarding stale event"
            );
            return;
        }

        match event.kind {
            StreamEventKind::Chunk(chunk) => self.apply_chunk(chunk),
            StreamEventKind::Failed(error) => {
                warn!(target: "ChatController::apply", error = %error, "Chat request failed");
                self.fail(error.to_string());
            }
            StreamEventKind::Closed => {
                debug!(target: "ChatController::apply", "Stream closed without finish");
                self.finish();
            }
        }
    }

    fn apply_chunk(&mut self, chunk: UiChunk) {
        if self.status == GenerationStatus::Submitted {
            self.status = GenerationStatus::Streaming;
        }

        match chunk {
            UiChunk::Start { message_id } => {
                self.ensure_draft(message_id);
            }
            UiChunk::Finish => self.finish(),
            UiChunk::Error { error_text } => self.fail(error_text),
            other => {
                self.ensure_draft(None);
                let changed = self
                    .active
                    .as_mut()
                    .and_then(|active| active.draft.as_mut())
                    .is_some_and(|draft| draft.apply(&other));
                if changed {
                    self.commit_draft();
                }
            }
        }
    }

    fn ensure_draft(&mut self, message_id: Option<String>) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if active.draft.is_some() {
            return;
        }
        let conversation = &self.conversation;
        let id = message_id
            .filter(|id| conversation.position(id).is_none())
            .unwrap_or_else(|| generate_id("assistant"));
        active.draft = Some(AssistantDraft::new(id));
    }

    /// Mirror the draft into the transcript once it has content.
    fn commit_draft(&mut self) {
        let Some(draft) = self.active.as_ref().and_then(|a| a.draft.as_ref()) else {
            return;
        };
        if draft.is_empty() {
            return;
        }
        let message = draft.message().clone();
        if let Some(existing) = self.conversation.get_mut(&message.id) {
            *existing = message;
        } else if let Err(e) = self.conversation.push(message) {
            warn!(
                target: "ChatController::commit_draft",
                error = %e,
                "Could not add assistant message"
            );
        }
    }

    fn finish(&mut self) {
        self.active = None;
        self.status = GenerationStatus::Idle;
    }

    fn fail(&mut self, message: String) {
        if let Some(active) = self.active.take() {
            active.token.cancel();
        }
        self.last_error = Some(message);
        self.status = GenerationStatus::Error;
    }

    fn outgoing_messages(&self) -> Vec<ChatMessage> {
        let messages = self.conversation.messages();
        match self.context_mode {
            ContextMode::FullHistory => messages.to_vec(),
            ContextMode::LatestTurnOnly => {
                let last_user = self.conversation.last_index_of(Role::User);
                messages
                    .iter()
                    .enumerate()
                    .filter(|(idx, m)| m.role == Role::System || Some(*idx) == last_user)
                    .map(|(_, m)| m.clone())
                    .collect()
            }
        }
    }

    fn start_request(&mut self) {
        self.next_request_id += 1;
        let request_id = self.next_request_id;
        let token = CancellationToken::new();
        let messages = self.outgoing_messages();

        self.active = Some(ActiveRequest {
            id: request_id,
            token: token.clone(),
            draft: None,
        });
        self.status = GenerationStatus::Submitted;
        self.last_error = None;

        info!(
            target: "ChatController::start_request",
            request_id,
            message_count = messages.len(),
            "Submitting chat request"
        );

        let transport = self.transport.clone();
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            let send = |kind| {
                // The receiver is gone when the UI has shut down
                let _ = events_tx.send(StreamEvent { request_id, kind });
            };

            let mut stream = match transport.open(messages, token.clone()).await {
                Ok(stream) => stream,
                Err(TransportError::Cancelled) => return,
                Err(e) => {
                    send(StreamEventKind::Failed(e));
                    return;
                }
            };

            loop {
                let next = tokio::select! {
                    biased;
                    () = token.cancelled() => return,
                    next = stream.next() => next,
                };
                match next {
                    Some(Ok(chunk)) => {
                        let terminal = chunk.is_terminal();
                        send(StreamEventKind::Chunk(chunk));
                        if terminal {
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        send(StreamEventKind::Failed(e));
                        return;
                    }
                    None => {
                        send(StreamEventKind::Closed);
                        return;
                    }
                }
            }
        });
    }
}
