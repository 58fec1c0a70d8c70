//! Message input rules.
//!
//! The editor itself belongs to the front-end; this module decides what a
//! key means for the conversation. Enter submits trimmed text, Shift+Enter
//! inserts a newline, whitespace-only input is never sent, and while a
//! response is being generated edits are ignored and Escape requests a
//! stop. The box grows with its content up to `max_rows` and scrolls past
//! that.

use crate::client::GenerationStatus;

pub const PLACEHOLDER: &str = "Type your message...";

/// What a key asks for, before the generation state is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputIntent {
    Submit,
    Newline,
    Stop,
    /// Anything the editor handles itself: typing, deletion, cursor motion.
    Edit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    Ignore,
    /// Trimmed, non-empty text to send. The editor should clear.
    Submit(String),
    Newline,
    Stop,
    Edit,
}

/// The control shown next to the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affordance {
    Send { enabled: bool },
    Stop,
}

/// Decide what `intent` does given the current editor `text`.
pub fn resolve(intent: InputIntent, text: &str, status: GenerationStatus) -> InputAction {
    if status.is_in_flight() {
        return match intent {
            InputIntent::Stop => InputAction::Stop,
            _ => InputAction::Ignore,
        };
    }

    match intent {
        InputIntent::Submit => submission(text).map_or(InputAction::Ignore, InputAction::Submit),
        InputIntent::Newline => InputAction::Newline,
        InputIntent::Edit => InputAction::Edit,
        InputIntent::Stop => InputAction::Ignore,
    }
}

/// The text that would be sent, or `None` if it is blank.
pub fn submission(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn affordance(text: &str, status: GenerationStatus) -> Affordance {
    if status.is_in_flight() {
        Affordance::Stop
    } else {
        Affordance::Send {
            enabled: submission(text).is_some(),
        }
    }
}

/// Rows the input occupies: grows with content, capped at `max_rows`.
pub fn visible_rows(line_count: usize, max_rows: u16) -> u16 {
    let lines = u16::try_from(line_count).unwrap_or(u16::MAX);
    lines.clamp(1, max_rows.max(1))
}

pub fn is_scrolling(line_count: usize, max_rows: u16) -> bool {
    line_count > usize::from(max_rows.max(1))
}
