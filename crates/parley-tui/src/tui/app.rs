//! Terminal-independent client state.
//!
//! [`App`] owns the controller, input box, copy feedback and render
//! boundary. The event loop feeds it keys, pastes, stream events and ticks;
//! drawing reads it back. Nothing here touches the terminal, so it can be
//! driven directly from tests.

use std::time::Instant;

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEventKind};
use ratatui::text::Line;
use tracing::{debug, info};

use parley_core::client::{ChatController, ControllerError, GenerationStatus, StreamEvent};
use parley_core::config::{ClientConfig, ContextMode};
use parley_core::input::{InputAction, InputIntent};
use parley_core::render::{
    Clipboard, CodeBlock, CopyFeedback, CopyState, RenderBoundary, Rendered,
};

use super::terminal;
use super::widgets::InputPanelState;
use super::widgets::message_list::{self, TranscriptState};
use super::widgets::wrap::wrap_lines;

/// What a key press means, before any state is consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    NewTopic,
    Regenerate,
    CopyCode,
    ToggleContext,
    ScrollUp(usize),
    ScrollDown(usize),
    ScrollToBottom,
    Input(InputIntent),
}

const PAGE: usize = 10;
const WHEEL_STEP: usize = 3;

pub fn map_key(key: KeyEvent) -> Option<Command> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let command = match key.code {
        KeyCode::Char('c') if ctrl => Command::Quit,
        KeyCode::Char('n') if ctrl => Command::NewTopic,
        KeyCode::Char('r') if ctrl => Command::Regenerate,
        KeyCode::Char('y') if ctrl => Command::CopyCode,
        KeyCode::Char('t') if ctrl => Command::ToggleContext,
        KeyCode::Char('j') if ctrl => Command::Input(InputIntent::Newline),
        KeyCode::Char(_) if ctrl => return None,
        KeyCode::Enter
            if key
                .modifiers
                .intersects(KeyModifiers::SHIFT | KeyModifiers::ALT | KeyModifiers::CONTROL) =>
        {
            Command::Input(InputIntent::Newline)
        }
        KeyCode::Enter => Command::Input(InputIntent::Submit),
        KeyCode::End if ctrl => Command::ScrollToBottom,
        KeyCode::Char(_)
        | KeyCode::Backspace
        | KeyCode::Delete
        | KeyCode::Left
        | KeyCode::Right
        | KeyCode::Up
        | KeyCode::Down
        | KeyCode::Home
        | KeyCode::End => Command::Input(InputIntent::Edit),
        KeyCode::Esc => Command::Input(InputIntent::Stop),
        KeyCode::PageUp => Command::ScrollUp(PAGE),
        KeyCode::PageDown => Command::ScrollDown(PAGE),
        _ => return None,
    };
    Some(command)
}

/// Transcript scroll position.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Scroll {
    /// Stick to the newest line.
    #[default]
    Follow,
    /// Keep this row at the top.
    Pinned(usize),
}

/// A transcript ready to draw: wrapped lines and the first visible row.
#[derive(Debug)]
pub struct TranscriptView {
    pub lines: Vec<Line<'static>>,
    pub top: usize,
    pub is_empty: bool,
}

pub struct App {
    controller: ChatController,
    input: InputPanelState,
    copy: CopyFeedback,
    boundary: RenderBoundary,
    clipboard: Box<dyn Clipboard + Send>,
    code_blocks: Vec<CodeBlock>,
    scroll: Scroll,
    /// Row count and viewport height from the last draw.
    last_layout: (usize, usize),
    spinner_frame: usize,
    notice: Option<String>,
    /// Digits typed after Ctrl+Y while choosing a code block.
    copy_pick: Option<String>,
    should_quit: bool,
}

impl App {
    pub fn new(
        controller: ChatController,
        config: &ClientConfig,
        clipboard: Box<dyn Clipboard + Send>,
    ) -> Self {
        Self {
            controller,
            input: InputPanelState::new(config.input_max_rows),
            copy: CopyFeedback::new(config.copy_feedback),
            boundary: RenderBoundary::new(),
            clipboard,
            code_blocks: Vec::new(),
            scroll: Scroll::Follow,
            last_layout: (0, 0),
            spinner_frame: 0,
            notice: None,
            copy_pick: None,
            should_quit: false,
        }
    }

    pub fn controller(&self) -> &ChatController {
        &self.controller
    }

    pub fn input(&self) -> &InputPanelState {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputPanelState {
        &mut self.input
    }

    pub fn status(&self) -> GenerationStatus {
        self.controller.status()
    }

    pub fn copy_state(&self, now: Instant) -> CopyState {
        self.copy.state(now)
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn scroll(&self) -> Scroll {
        self.scroll
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn has_render_failure(&self) -> bool {
        self.boundary.has_failed()
    }

    /// Handle a key press.
    ///
    /// While the render fallback is showing, only `r` (retry) and quit are
    /// accepted.
    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) {
        if self.boundary.has_failed() {
            match map_key(key) {
                Some(Command::Quit) => self.quit(),
                Some(Command::Input(InputIntent::Edit))
                    if matches!(key.code, KeyCode::Char('r' | 'R')) =>
                {
                    info!(target: "tui.app", "Retrying render");
                    self.boundary.retry();
                }
                _ => {}
            }
            return;
        }

        if self.copy_pick.is_some() {
            self.handle_copy_pick(key, now);
            return;
        }

        let Some(command) = map_key(key) else {
            return;
        };
        self.notice = None;

        match command {
            Command::Quit => self.quit(),
            Command::NewTopic => {
                self.controller.new_topic();
                self.input.clear();
                self.input.focus();
                self.scroll = Scroll::Follow;
            }
            Command::Regenerate => match self.controller.regenerate() {
                Ok(()) => self.scroll = Scroll::Follow,
                Err(e) => self.notice = Some(e.to_string()),
            },
            Command::CopyCode => self.start_copy_pick(now),
            Command::ToggleContext => {
                let next = match self.controller.context_mode() {
                    ContextMode::FullHistory => ContextMode::LatestTurnOnly,
                    ContextMode::LatestTurnOnly => ContextMode::FullHistory,
                };
                self.controller.set_context_mode(next);
                self.notice = Some(format!("Context: {next}"));
            }
            Command::ScrollUp(rows) => self.scroll_up(rows),
            Command::ScrollDown(rows) => self.scroll_down(rows),
            Command::ScrollToBottom => self.scroll = Scroll::Follow,
            Command::Input(intent) => self.handle_input(intent, key),
        }
    }

    /// Scroll the transcript with the mouse wheel. Returns whether anything
    /// moved.
    pub fn handle_mouse(&mut self, kind: MouseEventKind) -> bool {
        if self.boundary.has_failed() {
            return false;
        }
        let before = self.scroll;
        match kind {
            MouseEventKind::ScrollUp => self.scroll_up(WHEEL_STEP),
            MouseEventKind::ScrollDown => self.scroll_down(WHEEL_STEP),
            _ => return false,
        }
        self.scroll != before
    }

    pub fn handle_paste(&mut self, text: &str) {
        if self.boundary.has_failed() {
            return;
        }
        self.input.paste(text, self.controller.status());
    }

    pub fn handle_stream_event(&mut self, event: StreamEvent) {
        let was_in_flight = self.controller.is_loading();
        self.controller.apply(event);
        if was_in_flight && !self.controller.is_loading() {
            self.input.focus();
        }
    }

    /// Advance time-based state. Returns whether a redraw is needed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut changed = self.copy.tick(now);
        if self.controller.is_loading() {
            self.spinner_frame = self.spinner_frame.wrapping_add(1);
            changed = true;
        }
        changed
    }

    /// Whether anything on screen is animating or about to expire.
    pub fn wants_ticks(&self) -> bool {
        self.controller.is_loading() || self.copy.deadline().is_some()
    }

    /// Build the transcript for a viewport of `width` x `height`.
    ///
    /// A panic while building is caught and turned into the fallback; the
    /// fallback then stays up until the user retries.
    pub fn transcript(&mut self, width: u16, height: u16) -> Rendered<TranscriptView> {
        let state = TranscriptState {
            status: self.controller.status(),
            last_error: self.controller.last_error(),
            spinner_frame: self.spinner_frame,
        };
        let messages = self.controller.messages();

        let built = self.boundary.render(|| {
            terminal::recoverable(|| {
                let transcript = message_list::build(messages, state);
                let lines = wrap_lines(&transcript.lines, width);
                (lines, transcript.code_blocks, transcript.is_empty)
            })
        });

        match built {
            Rendered::Ok((lines, code_blocks, is_empty)) => {
                self.code_blocks = code_blocks;
                let height = usize::from(height);
                self.last_layout = (lines.len(), height);
                let top = self.resolve_top();
                Rendered::Ok(TranscriptView {
                    lines,
                    top,
                    is_empty,
                })
            }
            Rendered::Fallback(fallback) => Rendered::Fallback(fallback),
        }
    }

    fn handle_input(&mut self, intent: InputIntent, key: KeyEvent) {
        match self.input.handle_key(intent, key, self.controller.status()) {
            InputAction::Ignore | InputAction::Newline | InputAction::Edit => {}
            InputAction::Submit(text) => match self.controller.send_message(&text) {
                Ok(Some(id)) => {
                    debug!(target: "tui.app", message_id = %id, "Sent message");
                    self.scroll = Scroll::Follow;
                }
                Ok(None) => {}
                Err(ControllerError::Busy) => {
                    self.notice = Some("Wait for the current reply or press Esc".to_string());
                }
                Err(e) => self.notice = Some(e.to_string()),
            },
            InputAction::Stop => {
                if self.controller.stop() {
                    self.notice = Some("Stopped".to_string());
                }
            }
        }
    }

    /// Ctrl+Y: copy the only block right away, otherwise ask which one.
    fn start_copy_pick(&mut self, now: Instant) {
        match self.code_blocks.len() {
            0 => self.notice = Some("No code block to copy".to_string()),
            1 => self.copy_block(1, now),
            count => {
                self.copy_pick = Some(String::new());
                self.notice = Some(format!("Copy block [1-{count}], Enter for [{count}]"));
            }
        }
    }

    /// A key typed while choosing a block. A number copies as soon as no
    /// longer number could match; Enter or Ctrl+Y confirms, anything else
    /// cancels.
    fn handle_copy_pick(&mut self, key: KeyEvent, now: Instant) {
        let Some(mut digits) = self.copy_pick.take() else {
            return;
        };
        let count = self.code_blocks.len();
        match (map_key(key), key.code) {
            (Some(Command::Quit), _) => self.quit(),
            (Some(Command::Input(InputIntent::Edit)), KeyCode::Char(c)) if c.is_ascii_digit() => {
                digits.push(c);
                let n: usize = digits.parse().unwrap_or(0);
                if n == 0 || n > count {
                    self.notice = Some(format!("No code block [{digits}]"));
                } else if n * 10 > count {
                    self.copy_block(n, now);
                } else {
                    self.notice = Some(format!("Copy block [{n}]? Enter to confirm"));
                    self.copy_pick = Some(digits);
                }
            }
            (Some(Command::Input(InputIntent::Edit)), KeyCode::Backspace) => {
                digits.pop();
                self.copy_pick = Some(digits);
            }
            (Some(Command::Input(InputIntent::Submit) | Command::CopyCode), _) => {
                let n = digits.parse().unwrap_or(count);
                self.copy_block(n, now);
            }
            _ => self.notice = None,
        }
    }

    /// Copy block `[n]` (1-based, as labelled on screen).
    fn copy_block(&mut self, n: usize, now: Instant) {
        let Some(block) = n.checked_sub(1).and_then(|i| self.code_blocks.get(i)) else {
            self.notice = Some(format!("No code block [{n}]"));
            return;
        };
        let state = self.copy.copy(self.clipboard.as_mut(), &block.code, now);
        self.notice = None;
        debug!(target: "tui.app", block = n, ?state, "Copied code block");
    }

    fn quit(&mut self) {
        self.controller.stop();
        self.should_quit = true;
    }

    fn max_top(&self) -> usize {
        let (rows, height) = self.last_layout;
        rows.saturating_sub(height)
    }

    fn resolve_top(&mut self) -> usize {
        let max_top = self.max_top();
        match self.scroll {
            Scroll::Follow => max_top,
            Scroll::Pinned(top) if top >= max_top => {
                self.scroll = Scroll::Follow;
                max_top
            }
            Scroll::Pinned(top) => top,
        }
    }

    fn scroll_up(&mut self, rows: usize) {
        let top = match self.scroll {
            Scroll::Follow => self.max_top(),
            Scroll::Pinned(top) => top,
        };
        if self.max_top() > 0 {
            self.scroll = Scroll::Pinned(top.saturating_sub(rows));
        }
    }

    fn scroll_down(&mut self, rows: usize) {
        if let Scroll::Pinned(top) = self.scroll {
            let top = top + rows;
            self.scroll = if top >= self.max_top() {
                Scroll::Follow
            } else {
                Scroll::Pinned(top)
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::app::conversation::{ChatMessage, Part, Role};
    use parley_core::app::ui_stream::UiChunk;
    use parley_core::render::FALLBACK;
    use parley_core::test_utils::{ChannelTransport, MemoryClipboard};
    use rstest::rstest;
    use std::sync::Arc;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c)), Instant::now());
        }
    }

    fn app_with(
        transport: &ChannelTransport,
        clipboard: MemoryClipboard,
    ) -> (App, UnboundedReceiver<StreamEvent>) {
        let config = ClientConfig::default();
        let (controller, events) = ChatController::new(Arc::new(transport.clone()), &config);
        (App::new(controller, &config, Box::new(clipboard)), events)
    }

    async fn pump(app: &mut App, events: &mut UnboundedReceiver<StreamEvent>) {
        let event = events.recv().await.unwrap();
        app.handle_stream_event(event);
    }

    #[rstest]
    #[case::shift_enter(KeyCode::Enter, KeyModifiers::SHIFT, Some(Command::Input(InputIntent::Newline)))]
    #[case::alt_enter(KeyCode::Enter, KeyModifiers::ALT, Some(Command::Input(InputIntent::Newline)))]
    #[case::ctrl_j(KeyCode::Char('j'), KeyModifiers::CONTROL, Some(Command::Input(InputIntent::Newline)))]
    #[case::enter(KeyCode::Enter, KeyModifiers::NONE, Some(Command::Input(InputIntent::Submit)))]
    #[case::typing(KeyCode::Char('a'), KeyModifiers::SHIFT, Some(Command::Input(InputIntent::Edit)))]
    #[case::escape(KeyCode::Esc, KeyModifiers::NONE, Some(Command::Input(InputIntent::Stop)))]
    #[case::ctrl_end(KeyCode::End, KeyModifiers::CONTROL, Some(Command::ScrollToBottom))]
    #[case::copy(KeyCode::Char('y'), KeyModifiers::CONTROL, Some(Command::CopyCode))]
    #[case::unbound_ctrl(KeyCode::Char('x'), KeyModifiers::CONTROL, None)]
    #[case::page_up(KeyCode::PageUp, KeyModifiers::NONE, Some(Command::ScrollUp(PAGE)))]
    fn maps_keys(
        #[case] code: KeyCode,
        #[case] modifiers: KeyModifiers,
        #[case] expected: Option<Command>,
    ) {
        assert_eq!(map_key(KeyEvent::new(code, modifiers)), expected);
    }

    #[tokio::test]
    async fn submit_streams_reply_and_returns_focus() {
        let transport = ChannelTransport::new();
        let feed = transport.expect_request();
        let (mut app, mut events) = app_with(&transport, MemoryClipboard::new());

        type_text(&mut app, "Hi");
        app.handle_key(key(KeyCode::Enter), Instant::now());
        assert_eq!(app.status(), GenerationStatus::Submitted);
        assert_eq!(app.input().content(), "");

        // Typing is ignored while the reply streams
        type_text(&mut app, "x");
        assert_eq!(app.input().content(), "");

        feed.send(Ok(UiChunk::Start { message_id: None })).unwrap();
        feed.send(Ok(UiChunk::TextDelta {
            id: "t1".to_string(),
            delta: "Hello".to_string(),
        }))
        .unwrap();
        feed.send(Ok(UiChunk::Finish)).unwrap();
        for _ in 0..3 {
            pump(&mut app, &mut events).await;
        }

        assert_eq!(app.status(), GenerationStatus::Idle);
        assert!(app.input().is_focused());
        let messages = app.controller().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].text(), "Hello");
    }

    #[tokio::test]
    async fn escape_stops_generation() {
        let transport = ChannelTransport::new();
        let _feed = transport.expect_request();
        let (mut app, _events) = app_with(&transport, MemoryClipboard::new());

        type_text(&mut app, "Hi");
        app.handle_key(key(KeyCode::Enter), Instant::now());
        assert!(app.controller().is_loading());

        app.handle_key(key(KeyCode::Esc), Instant::now());
        assert_eq!(app.status(), GenerationStatus::Idle);
        assert_eq!(app.notice(), Some("Stopped"));
    }

    #[tokio::test]
    async fn copies_latest_code_block_with_feedback() {
        let transport = ChannelTransport::new();
        let clipboard = MemoryClipboard::new();
        let (mut app, _events) = app_with(&transport, clipboard.clone());
        app.controller
            .set_messages(vec![
                ChatMessage::user("code please"),
                ChatMessage::new(
                    Role::Assistant,
                    vec![Part::text(
                        "```sh\nls\n```\n\n```sh\npwd\n```",
                    )],
                ),
            ])
            .unwrap();

        app.handle_key(ctrl('y'), Instant::now());
        assert_eq!(app.notice(), Some("No code block to copy"));

        assert!(app.transcript(80, 20).ok().is_some());
        let now = Instant::now();
        app.handle_key(ctrl('y'), now);
        assert!(clipboard.contents().is_none());
        app.handle_key(key(KeyCode::Enter), now);
        assert_eq!(clipboard.contents().as_deref(), Some("pwd"));
        assert_eq!(app.copy_state(now), CopyState::Copied);
        assert!(app.wants_ticks());

        let later = now + ClientConfig::default().copy_feedback;
        assert!(app.tick(later));
        assert_eq!(app.copy_state(later), CopyState::Idle);
    }

    #[tokio::test]
    async fn copies_chosen_code_block_by_number() {
        let transport = ChannelTransport::new();
        let clipboard = MemoryClipboard::new();
        let (mut app, _events) = app_with(&transport, clipboard.clone());
        let blocks: String = (1..=12).map(|i| format!("```\nblock {i}\n```\n\n")).collect();
        app.controller
            .set_messages(vec![
                ChatMessage::user("many"),
                ChatMessage::new(Role::Assistant, vec![Part::text(blocks)]),
            ])
            .unwrap();
        assert!(app.transcript(80, 20).ok().is_some());
        let now = Instant::now();

        // Above the count once a second digit is impossible: copies at once
        app.handle_key(ctrl('y'), now);
        app.handle_key(key(KeyCode::Char('3')), now);
        assert_eq!(clipboard.contents().as_deref(), Some("block 3"));
        assert_eq!(app.copy_state(now), CopyState::Copied);

        // "1" could still become 10-12, so it waits for Enter
        app.handle_key(ctrl('y'), now);
        app.handle_key(key(KeyCode::Char('1')), now);
        assert_eq!(clipboard.contents().as_deref(), Some("block 3"));
        app.handle_key(key(KeyCode::Enter), now);
        assert_eq!(clipboard.contents().as_deref(), Some("block 1"));

        app.handle_key(ctrl('y'), now);
        app.handle_key(key(KeyCode::Char('1')), now);
        app.handle_key(key(KeyCode::Char('1')), now);
        assert_eq!(clipboard.contents().as_deref(), Some("block 11"));

        // Out of range and cancelled picks copy nothing; typing resumes after
        app.handle_key(ctrl('y'), now);
        app.handle_key(key(KeyCode::Char('0')), now);
        assert_eq!(app.notice(), Some("No code block [0]"));
        app.handle_key(ctrl('y'), now);
        app.handle_key(key(KeyCode::Esc), now);
        assert_eq!(clipboard.contents().as_deref(), Some("block 11"));
        type_text(&mut app, "ok");
        assert_eq!(app.input().content(), "ok");
    }

    #[tokio::test]
    async fn failed_copy_is_shown_not_raised() {
        let transport = ChannelTransport::new();
        let (mut app, _events) = app_with(&transport, MemoryClipboard::failing());
        app.controller
            .set_messages(vec![ChatMessage::new(
                Role::Assistant,
                vec![Part::text("```\nx\n```")],
            )])
            .unwrap();
        assert!(app.transcript(80, 20).ok().is_some());

        let now = Instant::now();
        app.handle_key(ctrl('y'), now);
        assert_eq!(app.copy_state(now), CopyState::Failed);
    }

    #[tokio::test]
    async fn follows_newest_until_scrolled_up() {
        let transport = ChannelTransport::new();
        let (mut app, _events) = app_with(&transport, MemoryClipboard::new());
        let long: String = (0..30).map(|i| format!("line {i}\n\n")).collect();
        app.controller
            .set_messages(vec![
                ChatMessage::user("go"),
                ChatMessage::new(
                    Role::Assistant,
                    vec![Part::text(long)],
                ),
            ])
            .unwrap();

        let view = app.transcript(80, 10).ok().unwrap();
        assert_eq!(view.top, view.lines.len() - 10);

        app.handle_key(key(KeyCode::PageUp), Instant::now());
        let pinned = app.transcript(80, 10).ok().unwrap();
        assert_eq!(pinned.top, view.top - PAGE);

        app.handle_key(key(KeyCode::PageDown), Instant::now());
        assert_eq!(app.scroll(), Scroll::Follow);
    }

    #[tokio::test]
    async fn new_topic_keeps_system_messages_and_clears_input() {
        let transport = ChannelTransport::new();
        let (mut app, _events) = app_with(&transport, MemoryClipboard::new());
        app.controller
            .set_messages(vec![
                ChatMessage::system("be brief"),
                ChatMessage::user("hi"),
            ])
            .unwrap();
        type_text(&mut app, "draft");

        app.handle_key(ctrl('n'), Instant::now());
        assert_eq!(app.controller().messages().len(), 1);
        assert_eq!(app.input().content(), "");
        assert!(app.transcript(80, 10).ok().unwrap().is_empty);
    }

    #[tokio::test]
    async fn regenerate_without_user_message_sets_notice() {
        let transport = ChannelTransport::new();
        let (mut app, _events) = app_with(&transport, MemoryClipboard::new());
        app.handle_key(ctrl('r'), Instant::now());
        assert_eq!(
            app.notice(),
            Some(ControllerError::NothingToRegenerate.to_string().as_str())
        );
    }

    #[tokio::test]
    async fn fallback_blocks_input_until_retry() {
        let transport = ChannelTransport::new();
        let (mut app, _events) = app_with(&transport, MemoryClipboard::new());

        let failed: Rendered<()> = app
            .boundary
            .render(|| std::panic::panic_any("broken view"));
        assert_eq!(failed, Rendered::Fallback(FALLBACK));
        assert!(matches!(app.transcript(80, 10), Rendered::Fallback(_)));

        type_text(&mut app, "xy");
        assert_eq!(app.input().content(), "");
        assert!(app.has_render_failure());

        app.handle_key(key(KeyCode::Char('r')), Instant::now());
        assert!(!app.has_render_failure());
        assert!(app.transcript(80, 10).ok().is_some());
    }
}
