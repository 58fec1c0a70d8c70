use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

use crate::app::conversation::ChatMessage;

/// Body of `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    InvalidJson,
    InvalidType,
    InvalidEnumValue,
    InvalidUnionDiscriminator,
    TooSmall,
    DuplicateId,
    UnmatchedToolResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => f.write_str(k),
            PathSegment::Index(i) => write!(f, "{i}"),
        }
    }
}

/// One itemized problem with a request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: IssueCode,
    pub path: Vec<PathSegment>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid request: {}", summarize(.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

fn summarize(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| {
            let path = i
                .path
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(".");
            format!("{path}: {}", i.message)
        })
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    pub fn single(code: IssueCode, path: Vec<PathSegment>, message: impl Into<String>) -> Self {
        Self {
            issues: vec![ValidationIssue {
                code,
                path,
                message: message.into(),
            }],
        }
    }
}

const ROLES: [&str; 3] = ["user", "assistant", "system"];
const PART_TYPES: [&str; 3] = ["text", "toolInvocation", "toolResult"];

/// Walks a request body and collects every issue rather than stopping at the first.
struct Validator {
    issues: Vec<ValidationIssue>,
    path: Vec<PathSegment>,
}

impl Validator {
    fn issue(&mut self, code: IssueCode, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            code,
            path: self.path.clone(),
            message: message.into(),
        });
    }

    fn at<F: FnOnce(&mut Self)>(&mut self, segment: impl Into<PathSegment>, f: F) {
        self.path.push(segment.into());
        f(self);
        self.path.pop();
    }

    fn required<'a>(&mut self, obj: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
        let value = obj.get(key);
        if value.is_none() {
            self.at(key, |v| v.issue(IssueCode::InvalidType, "Required"));
        }
        value
    }

    fn string_field(&mut self, obj: &Map<String, Value>, key: &str) -> Option<String> {
        let value = self.required(obj, key)?;
        if let Some(s) = value.as_str() {
            if s.is_empty() {
                self.at(key, |v| {
                    v.issue(IssueCode::TooSmall, "String must contain at least 1 character(s)");
                });
                return None;
            }
            Some(s.to_string())
        } else {
            let received = type_name(value);
            self.at(key, |v| {
                v.issue(
                    IssueCode::InvalidType,
                    format!("Expected string, received {received}"),
                );
            });
            None
        }
    }

    fn body(&mut self, body: &Value) {
        let Some(obj) = body.as_object() else {
            self.issue(
                IssueCode::InvalidType,
                format!("Expected object, received {}", type_name(body)),
            );
            return;
        };

        let Some(messages) = self.required(obj, "messages") else {
            return;
        };
        self.at("messages", |v| v.messages(messages));
    }

    fn messages(&mut self, messages: &Value) {
        let Some(list) = messages.as_array() else {
            self.issue(
                IssueCode::InvalidType,
                format!("Expected array, received {}", type_name(messages)),
            );
            return;
        };
        if list.is_empty() {
            self.issue(
                IssueCode::TooSmall,
                "Array must contain at least 1 element(s)",
            );
            return;
        }

        let mut ids = HashSet::new();
        let mut invocations = HashSet::new();
        for (index, message) in list.iter().enumerate() {
            self.at(index, |v| v.message(message, &mut ids, &mut invocations));
        }
    }

    fn message(
        &mut self,
        message: &Value,
        ids: &mut HashSet<String>,
        invocations: &mut HashSet<String>,
    ) {
        let Some(obj) = message.as_object() else {
            self.issue(
                IssueCode::InvalidType,
                format!("Expected object, received {}", type_name(message)),
            );
            return;
        };

        if let Some(id) = self.string_field(obj, "id") {
            if !ids.insert(id.clone()) {
                self.at("id", |v| {
                    v.issue(IssueCode::DuplicateId, format!("Duplicate message id '{id}'"));
                });
            }
        }

        if let Some(role) = self.required(obj, "role") {
            match role.as_str() {
                Some(r) if ROLES.contains(&r) => {}
                Some(r) => self.at("role", |v| {
                    v.issue(
                        IssueCode::InvalidEnumValue,
                        format!(
                            "Invalid enum value. Expected 'user' | 'assistant' | 'system', received '{r}'"
                        ),
                    );
                }),
                None => {
                    let received = type_name(role);
                    self.at("role", |v| {
                        v.issue(
                            IssueCode::InvalidType,
                            format!(
                                "Expected 'user' | 'assistant' | 'system', received {received}"
                            ),
                        );
                    });
                }
            }
        }

        if let Some(parts) = self.required(obj, "parts") {
            self.at("parts", |v| v.parts(parts, invocations));
        }
    }

    fn parts(&mut self, parts: &Value, invocations: &mut HashSet<String>) {
        let Some(list) = parts.as_array() else {
            self.issue(
                IssueCode::InvalidType,
                format!("Expected array, received {}", type_name(parts)),
            );
            return;
        };
        if list.is_empty() {
            self.issue(
                IssueCode::TooSmall,
                "Array must contain at least 1 element(s)",
            );
            return;
        }
        for (index, part) in list.iter().enumerate() {
            self.at(index, |v| v.part(part, invocations));
        }
    }

    fn part(&mut self, part: &Value, invocations: &mut HashSet<String>) {
        let Some(obj) = part.as_object() else {
            self.issue(
                IssueCode::InvalidType,
                format!("Expected object, received {}", type_name(part)),
            );
            return;
        };

        let kind = obj.get("type").and_then(Value::as_str);
        match kind {
            Some("text") => {
                let value = obj.get("content").or_else(|| obj.get("text"));
                match value {
                    Some(Value::String(_)) => {}
                    Some(other) => {
                        let received = type_name(other);
                        self.at("content", |v| {
                            v.issue(
                                IssueCode::InvalidType,
                                format!("Expected string, received {received}"),
                            );
                        });
                    }
                    None => self.at("content", |v| v.issue(IssueCode::InvalidType, "Required")),
                }
            }
            Some("toolInvocation") => {
                let id = self.string_field(obj, "toolCallId");
                self.string_field(obj, "toolName");
                if let Some(id) = id {
                    invocations.insert(id);
                }
            }
            Some("toolResult") => {
                let id = self.string_field(obj, "toolCallId");
                self.string_field(obj, "toolName");
                if let Some(id) = id {
                    if !invocations.contains(&id) {
                        self.at("toolCallId", |v| {
                            v.issue(
                                IssueCode::UnmatchedToolResult,
                                format!("Tool result '{id}' has no preceding invocation"),
                            );
                        });
                    }
                }
            }
            _ => self.at("type", |v| {
                v.issue(
                    IssueCode::InvalidUnionDiscriminator,
                    format!(
                        "Invalid discriminator value. Expected {}",
                        PART_TYPES
                            .iter()
                            .map(|t| format!("'{t}'"))
                            .collect::<Vec<_>>()
                            .join(" | ")
                    ),
                );
            }),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Validate a raw JSON body and decode it into a [`ChatRequest`].
///
/// All issues are collected; the caller answers with a 400 carrying them.
pub fn validate_chat_request(body: &Value) -> Result<ChatRequest, ValidationError> {
    let mut validator = Validator {
        issues: Vec::new(),
        path: Vec::new(),
    };
    validator.body(body);

    if !validator.issues.is_empty() {
        return Err(ValidationError {
            issues: validator.issues,
        });
    }

    serde_json::from_value(body.clone()).map_err(|e| {
        ValidationError::single(IssueCode::InvalidType, vec!["messages".into()], e.to_string())
    })
}

/// Parse raw bytes, mapping syntax errors to an `invalid_json` issue.
pub fn parse_chat_request(bytes: &[u8]) -> Result<ChatRequest, ValidationError> {
    let body: Value = serde_json::from_slice(bytes)
        .map_err(|e| ValidationError::single(IssueCode::InvalidJson, vec![], e.to_string()))?;
    validate_chat_request(&body)
}
