//! Message box backed by a [`TextArea`].
//!
//! The text area does the editing; [`parley_core::input`] decides whether a
//! key reaches it at all.

use ratatui::crossterm::event::KeyEvent;
use ratatui::layout::Rect;
use ratatui::prelude::{Buffer, StatefulWidget, Widget};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders};
use tui_textarea::{Input, TextArea};

use parley_core::client::GenerationStatus;
use parley_core::input::{self, Affordance, InputAction, InputIntent, PLACEHOLDER};

/// Stateful data for the [`InputPanel`] widget.
#[derive(Debug)]
pub struct InputPanelState {
    pub textarea: TextArea<'static>,
    max_rows: u16,
    focused: bool,
}

impl InputPanelState {
    pub fn new(max_rows: u16) -> Self {
        Self {
            textarea: new_textarea(),
            max_rows: max_rows.max(1),
            focused: true,
        }
    }

    /// Get the content of the textarea
    pub fn content(&self) -> String {
        self.textarea.lines().join("\n")
    }

    pub fn line_count(&self) -> usize {
        self.textarea.lines().len()
    }

    pub fn clear(&mut self) {
        self.textarea = new_textarea();
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn focus(&mut self) {
        self.focused = true;
    }

    pub fn blur(&mut self) {
        self.focused = false;
    }

    /// Apply a key press. `key` is forwarded to the text area when the
    /// intent turns out to be an edit.
    pub fn handle_key(
        &mut self,
        intent: InputIntent,
        key: KeyEvent,
        status: GenerationStatus,
    ) -> InputAction {
        let action = input::resolve(intent, &self.content(), status);
        match &action {
            InputAction::Ignore => {}
            InputAction::Submit(_) => {
                self.clear();
                self.focus();
            }
            InputAction::Newline => self.textarea.insert_newline(),
            InputAction::Edit => {
                self.textarea.input(Input::from(key));
            }
            InputAction::Stop => self.focus(),
        }
        action
    }

    /// Insert pasted text at the cursor. Ignored while a response is in
    /// flight.
    pub fn paste(&mut self, text: &str, status: GenerationStatus) {
        if status.is_in_flight() {
            return;
        }
        let normalized: String = text
            .replace("\r\n", "\n")
            .replace('\r', "\n")
            .chars()
            .filter(|c| *c == '\n' || *c == '\t' || !c.is_control())
            .collect();
        self.textarea.insert_str(normalized);
    }

    pub fn affordance(&self, status: GenerationStatus) -> Affordance {
        input::affordance(&self.content(), status)
    }

    pub fn visible_rows(&self) -> u16 {
        input::visible_rows(self.line_count(), self.max_rows)
    }

    pub fn is_scrolling(&self) -> bool {
        input::is_scrolling(self.line_count(), self.max_rows)
    }

    /// Rows needed including the border.
    pub fn required_height(&self) -> u16 {
        self.visible_rows() + 2
    }
}

fn new_textarea() -> TextArea<'static> {
    let mut textarea = TextArea::default();
    textarea.set_placeholder_text(PLACEHOLDER);
    textarea.set_placeholder_style(Style::default().fg(Color::DarkGray));
    textarea.set_cursor_line_style(Style::default());
    textarea.set_cursor_style(Style::default().add_modifier(Modifier::REVERSED));
    textarea
}

/// Properties for the [`InputPanel`] widget.
#[derive(Clone, Copy, Debug)]
pub struct InputPanel {
    status: GenerationStatus,
}

impl InputPanel {
    pub fn new(status: GenerationStatus) -> Self {
        Self { status }
    }

    fn affordance_title(affordance: Affordance) -> Line<'static> {
        match affordance {
            Affordance::Stop => Line::from(Span::styled(
                " ■ Stop (Esc) ",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )),
            Affordance::Send { enabled: true } => Line::from(Span::styled(
                " ➤ Send (Enter) ",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
            Affordance::Send { enabled: false } => Line::from(Span::styled(
                " ➤ Send ",
                Style::default().fg(Color::DarkGray),
            )),
        }
    }
}

impl StatefulWidget for InputPanel {
    type State = InputPanelState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        let in_flight = self.status.is_in_flight();
        let border_style = if in_flight {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Cyan)
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border_style)
            .title_bottom(Self::affordance_title(state.affordance(self.status)).right_aligned());
        let inner = block.inner(area);
        block.render(area, buf);

        // Hide the cursor while the input cannot be edited
        let cursor_style = if state.focused && !in_flight {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        };
        state.textarea.set_cursor_style(cursor_style);
        state.textarea.render(inner, buf);
    }
}
