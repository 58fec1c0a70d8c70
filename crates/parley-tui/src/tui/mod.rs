//! Terminal chat client.
//!
//! The event loop multiplexes terminal input, controller stream events and
//! a tick used for the spinner and copy feedback, redrawing only when
//! something changed.

use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::crossterm::event::{Event, EventStream, KeyEventKind};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use parley_core::app::conversation::ChatMessage;
use parley_core::client::{ChatController, HttpChatTransport, StreamEvent};
use parley_core::config::ClientConfig;

use crate::error::Result;

pub mod app;
pub mod clipboard;
pub mod terminal;
pub mod view;
pub mod widgets;

use app::App;
use clipboard::SystemClipboard;

const TICK_INTERVAL: Duration = Duration::from_millis(100);

pub struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    app: App,
    stream_events: UnboundedReceiver<StreamEvent>,
}

impl Tui {
    /// Take over the terminal. It is restored when the `Tui` is dropped.
    pub fn new(app: App, stream_events: UnboundedReceiver<StreamEvent>) -> Result<Self> {
        let mut guard = terminal::SetupGuard::new();
        let mut stdout = io::stdout();
        terminal::setup(&mut stdout)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        guard.disarm();

        Ok(Self {
            terminal,
            app,
            stream_events,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut term_events = EventStream::new();
        let mut tick = tokio::time::interval(TICK_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut needs_redraw = true;

        while !self.app.should_quit() {
            if needs_redraw {
                self.terminal
                    .draw(|frame| view::draw(frame, &mut self.app, Instant::now()))?;
                needs_redraw = false;
            }

            tokio::select! {
                event = term_events.next() => match event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        self.app.handle_key(key, Instant::now());
                        needs_redraw = true;
                    }
                    Some(Ok(Event::Mouse(mouse))) => {
                        needs_redraw |= self.app.handle_mouse(mouse.kind);
                    }
                    Some(Ok(Event::Paste(data))) => {
                        debug!(target: "tui.run", "Pasted {} bytes", data.len());
                        self.app.handle_paste(&data);
                        needs_redraw = true;
                    }
                    Some(Ok(Event::Resize(..))) => needs_redraw = true,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(target: "tui.run", "Fatal input error: {}. Exiting.", e);
                        return Err(e.into());
                    }
                    None => break,
                },
                Some(event) = self.stream_events.recv() => {
                    self.app.handle_stream_event(event);
                    needs_redraw = true;
                }
                _ = tick.tick(), if self.app.wants_ticks() => {
                    needs_redraw |= self.app.tick(Instant::now());
                }
            }
        }

        info!(target: "tui.run", "Exiting");
        Ok(())
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        let _ = self.terminal.show_cursor();
        terminal::cleanup();
    }
}

/// Connect to the chat endpoint in `config` and run until the user quits.
///
/// `transcript` seeds the conversation, e.g. one restored from a file.
pub async fn run_tui(config: ClientConfig, transcript: Vec<ChatMessage>) -> Result<()> {
    let transport = HttpChatTransport::new(&config.endpoint, config.connect_timeout)?;
    info!(target: "tui", endpoint = %transport.endpoint(), "Starting terminal client");

    let (mut controller, stream_events) = ChatController::new(Arc::new(transport), &config);
    if !transcript.is_empty() {
        info!(target: "tui", messages = transcript.len(), "Restoring transcript");
        controller.set_messages(transcript)?;
    }
    let app = App::new(controller, &config, Box::new(SystemClipboard::new()));

    terminal::install_panic_hook();
    let mut tui = Tui::new(app, stream_events)?;
    tui.run().await
}
