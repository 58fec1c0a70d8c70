//! Message rendering.
//!
//! Turns chat messages into HTML fragments: user text verbatim, assistant
//! text as sanitized and highlighted markdown, tool parts as labelled JSON
//! panels. System messages are never rendered.

pub mod boundary;
pub mod code;
pub mod highlight;
pub mod html;
pub mod sanitize;

use std::str::FromStr;

use thiserror::Error;

use crate::app::conversation::{ChatMessage, Part, Role};
use parley_tools::tools::BuiltinTool;

pub use boundary::{FALLBACK, Fallback, RenderBoundary, Rendered};
pub use code::{Clipboard, ClipboardError, CodeBlock, CopyFeedback, CopyState, extract_code_blocks};
pub use html::{escape_html, fence_language, markdown_options, markdown_to_html};
pub use sanitize::sanitize;

pub const EMPTY_STATE: &str = "How can I help you today?";
pub const THINKING: &str = "Thinking...";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Render panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub id: String,
    pub role: Role,
    pub html: String,
    /// Copyable blocks, indexed by the `data-copy` attribute in `html`.
    pub code_blocks: Vec<CodeBlock>,
}

/// Heading for a tool's panel.
pub fn tool_label(tool_name: &str) -> &str {
    BuiltinTool::from_str(tool_name).map_or(tool_name, |tool| tool.panel_label())
}

pub fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "You",
        Role::Assistant => "Assistant",
        Role::System => "System",
    }
}

pub fn render_message(message: &ChatMessage) -> Option<RenderedMessage> {
    if message.role == Role::System {
        return None;
    }

    let mut html = String::new();
    let mut code_blocks = Vec::new();

    for part in &message.parts {
        match part {
            Part::Text { content } if message.role == Role::User => {
                html.push_str(&html::user_text_html(content));
            }
            Part::Text { content } => {
                let (fragment, blocks) = markdown_to_html(content, code_blocks.len());
                html.push_str("<div class=\"markdown\">");
                html.push_str(&fragment);
                html.push_str("</div>\n");
                code_blocks.extend(blocks);
            }
            Part::ToolInvocation {
                tool_name,
                arguments,
                ..
            } => {
                html.push_str(&html::tool_panel_html(
                    tool_label(tool_name),
                    "tool-invocation",
                    &[(None, arguments)],
                ));
            }
            Part::ToolResult {
                tool_name,
                result,
                is_error,
                ..
            } => {
                let (kind, caption) = if *is_error {
                    ("tool-error", "Error:")
                } else {
                    ("tool-result", "Result:")
                };
                html.push_str(&html::tool_panel_html(
                    tool_label(tool_name),
                    kind,
                    &[(Some(caption), result)],
                ));
            }
        }
    }

    Some(RenderedMessage {
        id: message.id.clone(),
        role: message.role,
        html,
        code_blocks,
    })
}

const TRANSCRIPT_CSS: &str = "\
body{font-family:system-ui,sans-serif;max-width:48rem;margin:2rem auto;padding:0 1rem;color:#1f2328}
.message{border-radius:1rem;padding:1rem 1.5rem;margin-bottom:1rem}
.message-user{background:#e8f0fe;margin-left:15%}
.message-assistant{background:#f6f8fa;border:1px solid #d0d7de;margin-right:15%}
.message-role{font-size:.75rem;font-weight:600;text-transform:uppercase;margin-bottom:.5rem}
.user-text{white-space:pre-wrap;font-family:inherit;margin:0}
.code-block pre{background:#f6f8fa;padding:.75rem;overflow-x:auto;border-radius:.5rem}
.tool-panel{border:1px solid #0969da;border-radius:.5rem;padding:1rem;margin-top:.5rem}
.tool-label{font-size:.75rem;font-weight:600;text-transform:uppercase;color:#0969da}
.tool-error .tool-label{color:#cf222e}
.tool-json{font-size:.75rem;overflow-x:auto}
.empty-state{text-align:center;color:#656d76}
";

/// Standalone HTML document for a whole transcript.
pub fn render_transcript_html(messages: &[ChatMessage]) -> String {
    let rendered: Vec<RenderedMessage> = messages.iter().filter_map(render_message).collect();

    let mut body = String::new();
    if rendered.is_empty() {
        body.push_str(&format!("<p class=\"empty-state\">{EMPTY_STATE}</p>\n"));
    }
    for message in &rendered {
        body.push_str(&format!(
            "<article class=\"message message-{}\" id=\"{}\">\n<div class=\"message-role\">{}</div>\n{}</article>\n",
            message.role,
            escape_html(&message.id),
            role_label(message.role),
            message.html
        ));
    }

    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>Parley transcript</title>\n<style>\n{TRANSCRIPT_CSS}{}</style>\n</head>\n<body>\n<main class=\"transcript\">\n{body}</main>\n</body>\n</html>\n",
        highlight::highlight_css(highlight::DEFAULT_THEME)
    )
}
