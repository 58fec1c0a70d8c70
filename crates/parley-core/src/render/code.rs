use std::time::{Duration, Instant};

use pulldown_cmark::{Event, Parser, Tag};
use thiserror::Error;
use tracing::warn;

use super::html::fence_language;
use crate::config::DEFAULT_COPY_FEEDBACK;

/// Literal text of one fenced or indented code block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: Option<String>,
    pub code: String,
}

impl CodeBlock {
    /// The trailing newline the parser keeps on the last line is dropped.
    pub fn new(language: Option<String>, code: &str) -> Self {
        Self {
            language,
            code: code.strip_suffix('\n').unwrap_or(code).to_string(),
        }
    }
}

/// Code blocks of `markdown` in document order.
pub fn extract_code_blocks(markdown: &str) -> Vec<CodeBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<(Option<String>, String)> = None;

    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                current = Some((fence_language(&kind), String::new()));
            }
            Event::Text(text) => {
                if let Some((_, code)) = current.as_mut() {
                    code.push_str(&text);
                }
            }
            Event::End(Tag::CodeBlock(_)) => {
                if let Some((language, code)) = current.take() {
                    blocks.push(CodeBlock::new(language, &code));
                }
            }
            _ => {}
        }
    }
    blocks
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Clipboard unavailable: {0}")]
pub struct ClipboardError(pub String);

pub trait Clipboard {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyState {
    Idle,
    Copied,
    Failed,
}

impl CopyState {
    pub fn label(self) -> &'static str {
        match self {
            CopyState::Idle => "Copy",
            CopyState::Copied => "Copied!",
            CopyState::Failed => "Copy failed",
        }
    }
}

/// Transient copy status that reverts to idle after a fixed delay.
#[derive(Debug, Clone)]
pub struct CopyFeedback {
    state: CopyState,
    since: Option<Instant>,
    delay: Duration,
}

impl Default for CopyFeedback {
    fn default() -> Self {
        Self::new(DEFAULT_COPY_FEEDBACK)
    }
}

impl CopyFeedback {
    pub fn new(delay: Duration) -> Self {
        Self {
            state: CopyState::Idle,
            since: None,
            delay,
        }
    }

    /// Copy `code` and record the outcome. Failures are never fatal.
    pub fn copy(&mut self, clipboard: &mut dyn Clipboard, code: &str, now: Instant) -> CopyState {
        self.state = match clipboard.set_text(code) {
            Ok(()) => CopyState::Copied,
            Err(e) => {
                warn!(target: "render::code", error = %e, "Copy to clipboard failed");
                CopyState::Failed
            }
        };
        self.since = Some(now);
        self.state
    }

    pub fn state(&self, now: Instant) -> CopyState {
        match self.since {
            Some(since) if now.saturating_duration_since(since) < self.delay => self.state,
            _ => CopyState::Idle,
        }
    }

    /// Drop expired feedback. Returns true when the visible state changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.since.is_some() && self.state(now) == CopyState::Idle {
            self.state = CopyState::Idle;
            self.since = None;
            return true;
        }
        false
    }

    /// When the current feedback expires, if any is showing.
    pub fn deadline(&self) -> Option<Instant> {
        self.since.map(|since| since + self.delay)
    }
}
