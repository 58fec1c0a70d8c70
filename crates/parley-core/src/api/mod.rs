pub mod error;
pub mod openai;
pub mod provider;
pub mod sse;
pub mod util;

pub use error::{ApiError, SseParseError, StreamError};
pub use openai::OpenAIChatClient;
pub use provider::{
    AssistantContent, CompletionResponse, CompletionStream, ModelMessage, Provider, StreamChunk,
};
