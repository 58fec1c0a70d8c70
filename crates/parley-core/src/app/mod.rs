pub mod agent_executor;
pub mod conversation;
pub mod ui_stream;
pub mod validation;

pub use agent_executor::{
    AgentExecutor, AgentExecutorError, AgentExecutorRunRequest, AgentRunOutcome,
};
pub use conversation::{ChatMessage, Conversation, ConversationError, Part, Role, to_model_messages};
pub use ui_stream::UiChunk;
pub use validation::{ChatRequest, ValidationError, ValidationIssue, validate_chat_request};
