//! Message types for conversation representation.
//!
//! - `ChatMessage` - one role-tagged turn made of ordered `Part`s
//! - `Part` - the closed set of part kinds a message may carry
//! - `Conversation` - an ordered list of messages with unique ids

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use strum::{Display, EnumString};
use thiserror::Error;

use crate::api::{AssistantContent, ModelMessage};
use parley_tools::ToolCall;

/// Role in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One semantic unit within a message. Render order is array order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Part {
    Text {
        #[serde(alias = "text")]
        content: String,
    },
    ToolInvocation {
        tool_call_id: String,
        tool_name: String,
        #[serde(default)]
        arguments: Value,
    },
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        #[serde(default)]
        result: Value,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

impl Part {
    pub fn text(content: impl Into<String>) -> Self {
        Part::Text {
            content: content.into(),
        }
    }

    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            Part::Text { .. } => None,
            Part::ToolInvocation { tool_call_id, .. } | Part::ToolResult { tool_call_id, .. } => {
                Some(tool_call_id)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub parts: Vec<Part>,
}

impl ChatMessage {
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        let prefix = match role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        };
        Self {
            id: generate_id(prefix),
            role,
            parts,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::text(text)])
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![Part::text(text)])
    }

    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { content } => Some(content.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Append a text delta, extending the trailing text part when there is one.
    pub fn append_text(&mut self, delta: &str) {
        if let Some(Part::Text { content }) = self.parts.last_mut() {
            content.push_str(delta);
        } else {
            self.parts.push(Part::text(delta));
        }
    }

    pub fn has_invocation(&self, tool_call_id: &str) -> bool {
        self.parts.iter().any(|p| {
            matches!(p, Part::ToolInvocation { tool_call_id: id, .. } if id == tool_call_id)
        })
    }
}

/// Helper to generate unique, time-ordered IDs
pub fn generate_id(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::now_v7())
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("Duplicate message id: {0}")]
    DuplicateId(String),
    #[error("Message {0} has no parts")]
    EmptyParts(String),
    #[error("Tool result '{tool_call_id}' in message {message_id} has no preceding invocation")]
    UnmatchedToolResult {
        message_id: String,
        tool_call_id: String,
    },
}

/// A message needs at least one part, and each tool result must answer an
/// invocation seen earlier in the same message or in `invocations`.
fn check_message<'a>(
    message: &'a ChatMessage,
    invocations: &mut HashSet<&'a str>,
) -> Result<(), ConversationError> {
    if message.parts.is_empty() {
        return Err(ConversationError::EmptyParts(message.id.clone()));
    }
    for part in &message.parts {
        match part {
            Part::ToolInvocation { tool_call_id, .. } => {
                invocations.insert(tool_call_id.as_str());
            }
            Part::ToolResult { tool_call_id, .. }
                if !invocations.contains(tool_call_id.as_str()) =>
            {
                return Err(ConversationError::UnmatchedToolResult {
                    message_id: message.id.clone(),
                    tool_call_id: tool_call_id.clone(),
                });
            }
            _ => {}
        }
    }
    Ok(())
}

/// Ordered messages with unique ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list, rejecting duplicate ids, empty messages and tool
    /// results without an earlier invocation.
    pub fn from_messages(messages: Vec<ChatMessage>) -> Result<Self, ConversationError> {
        let mut seen = HashSet::new();
        let mut invocations = HashSet::new();
        for message in &messages {
            if !seen.insert(message.id.as_str()) {
                return Err(ConversationError::DuplicateId(message.id.clone()));
            }
            check_message(message, &mut invocations)?;
        }
        Ok(Self { messages })
    }

    pub fn push(&mut self, message: ChatMessage) -> Result<(), ConversationError> {
        if self.messages.iter().any(|m| m.id == message.id) {
            return Err(ConversationError::DuplicateId(message.id));
        }
        let mut invocations: HashSet<&str> = self
            .messages
            .iter()
            .flat_map(|m| &m.parts)
            .filter_map(|p| match p {
                Part::ToolInvocation { tool_call_id, .. } => Some(tool_call_id.as_str()),
                _ => None,
            })
            .collect();
        check_message(&message, &mut invocations)?;
        self.messages.push(message);
        Ok(())
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }

    pub fn last_index_of(&self, role: Role) -> Option<usize> {
        self.messages.iter().rposition(|m| m.role == role)
    }

    /// Drop every message at or after `len`.
    pub fn truncate(&mut self, len: usize) {
        self.messages.truncate(len);
    }

    /// Keep only system-role messages, used for "new topic".
    pub fn retain_system(&mut self) {
        self.messages.retain(|m| m.role == Role::System);
    }
}

/// Fold UI messages into the provider-neutral form sent upstream.
///
/// Assistant messages that span several tool steps are split into one
/// assistant turn per step, each followed by its tool results. Invocations
/// without a recorded result are dropped so the upstream never sees a
/// dangling tool call.
pub fn to_model_messages(messages: &[ChatMessage]) -> Vec<ModelMessage> {
    let mut out = Vec::new();

    for message in messages {
        match message.role {
            Role::System => {
                let content = message.text();
                if !content.is_empty() {
                    out.push(ModelMessage::System { content });
                }
            }
            Role::User => out.push(ModelMessage::User {
                content: message.text(),
            }),
            Role::Assistant => push_assistant_steps(message, &mut out),
        }
    }

    out
}

fn push_assistant_steps(message: &ChatMessage, out: &mut Vec<ModelMessage>) {
    let resolved: HashSet<&str> = message
        .parts
        .iter()
        .filter_map(|p| match p {
            Part::ToolResult { tool_call_id, .. } => Some(tool_call_id.as_str()),
            _ => None,
        })
        .collect();

    let mut content: Vec<AssistantContent> = Vec::new();
    let mut results: Vec<ModelMessage> = Vec::new();

    let flush = |content: &mut Vec<AssistantContent>,
                 results: &mut Vec<ModelMessage>,
                 out: &mut Vec<ModelMessage>| {
        if !content.is_empty() {
            out.push(ModelMessage::Assistant {
                content: std::mem::take(content),
            });
        }
        out.append(results);
    };

    for part in &message.parts {
        match part {
            Part::Text { content: text } => {
                if !results.is_empty() {
                    flush(&mut content, &mut results, out);
                }
                if let Some(AssistantContent::Text { text: existing }) = content.last_mut() {
                    existing.push_str(text);
                } else if !text.is_empty() {
                    content.push(AssistantContent::Text { text: text.clone() });
                }
            }
            Part::ToolInvocation {
                tool_call_id,
                tool_name,
                arguments,
            } => {
                if !results.is_empty() {
                    flush(&mut content, &mut results, out);
                }
                if resolved.contains(tool_call_id.as_str()) {
                    content.push(AssistantContent::ToolCall {
                        tool_call: ToolCall {
                            name: tool_name.clone(),
                            parameters: arguments.clone(),
                            id: tool_call_id.clone(),
                        },
                    });
                }
            }
            Part::ToolResult {
                tool_call_id,
                result,
                is_error,
                ..
            } => {
                let rendered = match result {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                results.push(ModelMessage::Tool {
                    tool_call_id: tool_call_id.clone(),
                    content: if *is_error {
                        format!("Error: {rendered}")
                    } else {
                        rendered
                    },
                });
            }
        }
    }

    flush(&mut content, &mut results, out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parts_use_camel_case_tags() {
        let part = Part::ToolInvocation {
            tool_call_id: "call_1".to_string(),
            tool_name: "weather".to_string(),
            arguments: json!({"location": "Lisbon"}),
        };
        assert_eq!(
            serde_json::to_value(&part).unwrap(),
            json!({
                "type": "toolInvocation",
                "toolCallId": "call_1",
                "toolName": "weather",
                "arguments": {"location": "Lisbon"}
            })
        );
    }

    #[test]
    fn unknown_part_tag_is_rejected() {
        let err = serde_json::from_value::<Part>(json!({"type": "image", "url": "x"}));
        assert!(err.is_err());
    }

    #[test]
    fn text_part_accepts_text_alias() {
        let part: Part = serde_json::from_value(json!({"type": "text", "text": "hi"})).unwrap();
        assert_eq!(part, Part::text("hi"));
    }

    #[test]
    fn conversation_rejects_duplicate_ids() {
        let mut conversation = Conversation::new();
        let message = ChatMessage::user("hi");
        conversation.push(message.clone()).unwrap();
        assert_eq!(
            conversation.push(message.clone()),
            Err(ConversationError::DuplicateId(message.id.clone()))
        );
        assert!(Conversation::from_messages(vec![message.clone(), message]).is_err());
    }

    #[test]
    fn conversation_rejects_messages_without_parts() {
        let empty = ChatMessage::new(Role::User, vec![]);
        assert_eq!(
            Conversation::from_messages(vec![ChatMessage::user("hi"), empty.clone()]),
            Err(ConversationError::EmptyParts(empty.id.clone()))
        );

        let mut conversation = Conversation::new();
        assert_eq!(
            conversation.push(empty.clone()),
            Err(ConversationError::EmptyParts(empty.id))
        );
        assert!(conversation.messages().is_empty());
    }

    fn invocation(id: &str) -> Part {
        Part::ToolInvocation {
            tool_call_id: id.to_string(),
            tool_name: "weather".to_string(),
            arguments: json!({"location": "Oslo"}),
        }
    }

    fn result(id: &str) -> Part {
        Part::ToolResult {
            tool_call_id: id.to_string(),
            tool_name: "weather".to_string(),
            result: json!({"temperature": 50}),
            is_error: false,
        }
    }

    #[test]
    fn tool_results_must_follow_their_invocation() {
        let orphan = ChatMessage::new(Role::Assistant, vec![result("nope")]);
        assert_eq!(
            Conversation::from_messages(vec![orphan.clone()]),
            Err(ConversationError::UnmatchedToolResult {
                message_id: orphan.id.clone(),
                tool_call_id: "nope".to_string(),
            })
        );

        // Result before its invocation within one message
        let reversed = ChatMessage::new(Role::Assistant, vec![result("c1"), invocation("c1")]);
        assert!(Conversation::from_messages(vec![reversed]).is_err());

        let mut conversation = Conversation::from_messages(vec![ChatMessage::new(
            Role::Assistant,
            vec![invocation("c1"), result("c1")],
        )])
        .unwrap();
        assert!(conversation.push(orphan).is_err());

        // An invocation in an earlier message answers a later result
        conversation
            .push(ChatMessage::new(Role::Assistant, vec![invocation("c2")]))
            .unwrap();
        conversation
            .push(ChatMessage::new(Role::Assistant, vec![result("c2")]))
            .unwrap();
        assert_eq!(conversation.messages().len(), 3);
    }

    #[test]
    fn retain_system_keeps_only_system_prefix() {
        let mut conversation = Conversation::from_messages(vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("hi"),
            ChatMessage::new(Role::Assistant, vec![Part::text("hello")]),
        ])
        .unwrap();

        conversation.retain_system();

        assert_eq!(conversation.messages().len(), 1);
        assert_eq!(conversation.messages()[0].role, Role::System);
    }

    #[test]
    fn assistant_tool_steps_are_split_for_upstream() {
        let assistant = ChatMessage::new(
            Role::Assistant,
            vec![
                Part::text("Let me check. "),
                Part::ToolInvocation {
                    tool_call_id: "call_1".to_string(),
                    tool_name: "weather".to_string(),
                    arguments: json!({"location": "Oslo"}),
                },
                Part::ToolResult {
                    tool_call_id: "call_1".to_string(),
                    tool_name: "weather".to_string(),
                    result: json!({"location": "Oslo", "temperature": 41}),
                    is_error: false,
                },
                Part::text("It is 41F."),
            ],
        );

        let model = to_model_messages(&[ChatMessage::user("weather?"), assistant]);

        assert_eq!(model.len(), 4);
        assert!(matches!(&model[0], ModelMessage::User { content } if content == "weather?"));
        match &model[1] {
            ModelMessage::Assistant { content } => {
                assert_eq!(content.len(), 2);
                assert!(matches!(
                    &content[1],
                    AssistantContent::ToolCall { tool_call } if tool_call.id == "call_1"
                ));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            &model[2],
            ModelMessage::Tool { tool_call_id, .. } if tool_call_id == "call_1"
        ));
        assert!(matches!(&model[3], ModelMessage::Assistant { content } if content.len() == 1));
    }

    #[test]
    fn unresolved_invocations_are_dropped() {
        let assistant = ChatMessage::new(
            Role::Assistant,
            vec![
                Part::text("Checking"),
                Part::ToolInvocation {
                    tool_call_id: "call_9".to_string(),
                    tool_name: "weather".to_string(),
                    arguments: json!({}),
                },
            ],
        );

        let model = to_model_messages(&[assistant]);
        assert_eq!(model.len(), 1);
        assert!(matches!(&model[0], ModelMessage::Assistant { content } if content.len() == 1));
    }
}
