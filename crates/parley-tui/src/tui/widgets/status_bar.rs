//! Status bar: generation state, context mode, copy feedback and key hints.

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

use parley_core::client::GenerationStatus;
use parley_core::config::ContextMode;
use parley_core::render::CopyState;

const HINTS: &str = "^Y copy  ^R regenerate  ^N new topic  ^T context  ^C quit ";

pub struct StatusBar {
    status: GenerationStatus,
    context_mode: ContextMode,
    copy: CopyState,
    notice: Option<String>,
}

impl StatusBar {
    pub fn new(status: GenerationStatus, context_mode: ContextMode) -> Self {
        Self {
            status,
            context_mode,
            copy: CopyState::Idle,
            notice: None,
        }
    }

    pub fn with_copy_state(mut self, copy: CopyState) -> Self {
        self.copy = copy;
        self
    }

    pub fn with_notice(mut self, notice: Option<String>) -> Self {
        self.notice = notice;
        self
    }
}

fn status_style(status: GenerationStatus) -> Style {
    match status {
        GenerationStatus::Idle => Style::default().fg(Color::Green),
        GenerationStatus::Submitted | GenerationStatus::Streaming => {
            Style::default().fg(Color::Yellow)
        }
        GenerationStatus::Error => Style::default().fg(Color::Red),
    }
}

impl Widget for StatusBar {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut left = vec![
            Span::styled(
                format!(" {} ", self.status),
                status_style(self.status).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(" context: {} ", self.context_mode),
                Style::default().fg(Color::DarkGray),
            ),
        ];
        match self.copy {
            CopyState::Idle => {}
            CopyState::Copied => left.push(Span::styled(
                format!(" {} ", self.copy.label()),
                Style::default().fg(Color::Green),
            )),
            CopyState::Failed => left.push(Span::styled(
                format!(" {} ", self.copy.label()),
                Style::default().fg(Color::Red),
            )),
        }
        if let Some(notice) = self.notice {
            left.push(Span::styled(
                format!(" {notice} "),
                Style::default().fg(Color::Yellow),
            ));
        }
        let left = Line::from(left);
        let left_width = left.width();
        Paragraph::new(left).render(area, buf);

        // Hints only when they fit beside the status
        let hints = Line::styled(HINTS, Style::default().fg(Color::DarkGray));
        if left_width + hints.width() <= usize::from(area.width) {
            Paragraph::new(hints)
                .alignment(Alignment::Right)
                .render(area, buf);
        }
    }
}
