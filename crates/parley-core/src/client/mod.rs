pub mod assembler;
pub mod controller;
pub mod transport;

pub use assembler::AssistantDraft;
pub use controller::{
    ChatController, ControllerError, GenerationStatus, StreamEvent, StreamEventKind,
};
pub use transport::{ChatTransport, HttpChatTransport, TransportError, UiChunkStream};
