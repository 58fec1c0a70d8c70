//! Transcript lines: one labelled block per visible message, followed by
//! the thinking indicator or the last error.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use serde_json::Value;

use parley_core::app::conversation::{ChatMessage, Part, Role};
use parley_core::client::GenerationStatus;
use parley_core::render::{
    CodeBlock, EMPTY_STATE, THINKING, extract_code_blocks, role_label, tool_label,
};

use super::markdown::{self, MarkdownStyles, strip_controls};

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Inputs the transcript depends on besides the messages themselves.
#[derive(Debug, Clone, Copy)]
pub struct TranscriptState<'a> {
    pub status: GenerationStatus,
    pub last_error: Option<&'a str>,
    pub spinner_frame: usize,
}

#[derive(Debug, Default)]
pub struct Transcript {
    pub lines: Vec<Line<'static>>,
    /// Every fenced block in display order; `[n]` in a block header is
    /// `code_blocks[n - 1]`.
    pub code_blocks: Vec<CodeBlock>,
    pub is_empty: bool,
}

pub fn build(messages: &[ChatMessage], state: TranscriptState<'_>) -> Transcript {
    let styles = MarkdownStyles::default();
    let mut transcript = Transcript::default();

    let visible: Vec<&ChatMessage> = messages.iter().filter(|m| m.role != Role::System).collect();
    transcript.is_empty = visible.is_empty();

    for message in &visible {
        if !transcript.lines.is_empty() {
            transcript.lines.push(Line::default());
        }
        transcript.lines.push(role_header(message.role));
        push_message(&mut transcript, message, &styles);
    }

    let awaiting_reply = visible.last().is_none_or(|m| m.role != Role::Assistant);
    match state.status {
        GenerationStatus::Submitted | GenerationStatus::Streaming if awaiting_reply => {
            if !transcript.lines.is_empty() {
                transcript.lines.push(Line::default());
            }
            let frame = SPINNER[state.spinner_frame % SPINNER.len()];
            transcript.lines.push(Line::from(vec![
                Span::styled(format!("{frame} "), Style::default().fg(Color::Cyan)),
                Span::styled(THINKING, Style::default().fg(Color::DarkGray)),
            ]));
        }
        GenerationStatus::Error => {
            transcript.lines.push(Line::default());
            let message = state.last_error.unwrap_or("Request failed");
            transcript.lines.push(Line::styled(
                format!("Error: {}", strip_controls(message)),
                Style::default().fg(Color::Red),
            ));
            transcript.lines.push(Line::styled(
                "Press Ctrl+R to regenerate.",
                Style::default().fg(Color::DarkGray),
            ));
        }
        _ => {}
    }

    transcript
}

/// Centered placeholder shown when nothing has been said yet.
pub fn empty_state() -> Line<'static> {
    Line::styled(EMPTY_STATE, Style::default().fg(Color::DarkGray)).centered()
}

fn role_header(role: Role) -> Line<'static> {
    let color = match role {
        Role::User => Color::Green,
        Role::Assistant | Role::System => Color::Cyan,
    };
    Line::styled(
        role_label(role),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )
}

fn push_message(transcript: &mut Transcript, message: &ChatMessage, styles: &MarkdownStyles) {
    for part in &message.parts {
        match part {
            Part::Text { content } if message.role == Role::User => {
                for line in strip_controls(content).split('\n') {
                    transcript.lines.push(Line::raw(line.to_string()));
                }
            }
            Part::Text { content } => {
                let first = transcript.code_blocks.len();
                transcript
                    .lines
                    .extend(markdown::render(content, styles, first));
                transcript.code_blocks.extend(extract_code_blocks(content));
            }
            Part::ToolInvocation {
                tool_name,
                arguments,
                ..
            } => push_tool_panel(
                &mut transcript.lines,
                tool_label(tool_name),
                None,
                arguments,
                Color::Blue,
            ),
            Part::ToolResult {
                tool_name,
                result,
                is_error,
                ..
            } => {
                let (caption, color) = if *is_error {
                    ("Error:", Color::Red)
                } else {
                    ("Result:", Color::Blue)
                };
                push_tool_panel(
                    &mut transcript.lines,
                    tool_label(tool_name),
                    Some(caption),
                    result,
                    color,
                );
            }
        }
    }
}

fn push_tool_panel(
    lines: &mut Vec<Line<'static>>,
    label: &str,
    caption: Option<&str>,
    value: &Value,
    color: Color,
) {
    let border = Style::default().fg(color);
    lines.push(Line::styled(
        format!("┌ {label}"),
        border.add_modifier(Modifier::BOLD),
    ));
    if let Some(caption) = caption {
        lines.push(Line::from(vec![
            Span::styled("│ ", border),
            Span::styled(caption.to_string(), Style::default().fg(Color::DarkGray)),
        ]));
    }
    let json = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    for line in strip_controls(&json).lines() {
        lines.push(Line::from(vec![
            Span::styled("│ ", border),
            Span::raw(line.to_string()),
        ]));
    }
    lines.push(Line::styled("└", border));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plain(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    fn idle() -> TranscriptState<'static> {
        TranscriptState {
            status: GenerationStatus::Idle,
            last_error: None,
            spinner_frame: 0,
        }
    }

    #[test]
    fn hides_system_messages_and_reports_empty() {
        let transcript = build(&[ChatMessage::system("rules")], idle());
        assert!(transcript.is_empty);
        assert!(transcript.lines.is_empty());
    }

    #[test]
    fn user_text_is_shown_verbatim() {
        let transcript = build(&[ChatMessage::user("**not bold**\nsecond")], idle());
        assert_eq!(
            plain(&transcript.lines),
            vec!["You", "**not bold**", "second"]
        );
    }

    #[test]
    fn tool_parts_render_as_labelled_panels() {
        let message = ChatMessage::new(
            Role::Assistant,
            vec![
                Part::ToolInvocation {
                    tool_call_id: "c1".to_string(),
                    tool_name: "convertFahrenheitToCelsius".to_string(),
                    arguments: json!({"temperature": 212}),
                },
                Part::ToolResult {
                    tool_call_id: "c1".to_string(),
                    tool_name: "convertFahrenheitToCelsius".to_string(),
                    result: json!({"celsius": 100}),
                    is_error: false,
                },
            ],
        );
        let lines = plain(&build(&[message], idle()).lines);
        assert_eq!(lines[0], "Assistant");
        assert_eq!(lines[1], "┌ Conversion Result");
        assert!(lines.contains(&"│   \"temperature\": 212".to_string()));
        assert!(lines.contains(&"│ Result:".to_string()));
        assert!(lines.contains(&"│   \"celsius\": 100".to_string()));
    }

    #[test]
    fn code_blocks_are_collected_across_messages() {
        let first = ChatMessage::new(Role::Assistant, vec![Part::text("```sh\nls\n```")]);
        let second = ChatMessage::new(Role::Assistant, vec![Part::text("```\npwd\n```")]);
        let transcript = build(&[first, ChatMessage::user("more"), second], idle());
        let codes: Vec<&str> = transcript
            .code_blocks
            .iter()
            .map(|b| b.code.as_str())
            .collect();
        assert_eq!(codes, vec!["ls", "pwd"]);
        assert!(plain(&transcript.lines).contains(&"╭─ [2] text ".to_string()));
    }

    #[test]
    fn thinking_shows_until_assistant_output_arrives() {
        let waiting = TranscriptState {
            status: GenerationStatus::Submitted,
            ..idle()
        };
        let lines = plain(&build(&[ChatMessage::user("hi")], waiting).lines);
        assert_eq!(lines.last().unwrap(), &format!("{} {THINKING}", SPINNER[0]));

        let streaming = TranscriptState {
            status: GenerationStatus::Streaming,
            ..idle()
        };
        let reply = ChatMessage::new(Role::Assistant, vec![Part::text("Hel")]);
        let lines = plain(&build(&[ChatMessage::user("hi"), reply], streaming).lines);
        assert!(!lines.iter().any(|l| l.contains(THINKING)));
    }

    #[test]
    fn error_status_shows_message() {
        let failed = TranscriptState {
            status: GenerationStatus::Error,
            last_error: Some("An error occurred."),
            spinner_frame: 0,
        };
        let lines = plain(&build(&[ChatMessage::user("hi")], failed).lines);
        assert!(lines.contains(&"Error: An error occurred.".to_string()));
    }
}
