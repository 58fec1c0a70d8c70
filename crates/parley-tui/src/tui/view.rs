use std::time::Instant;

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Paragraph, Wrap},
};

use parley_core::render::{Fallback, Rendered};

use super::app::App;
use super::widgets::message_list::empty_state;
use super::widgets::{InputPanel, StatusBar};

pub fn draw(frame: &mut Frame<'_>, app: &mut App, now: Instant) {
    let [transcript_area, input_area, status_area] = Layout::vertical([
        Constraint::Min(1),
        Constraint::Length(app.input().required_height()),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    match app.transcript(transcript_area.width, transcript_area.height) {
        Rendered::Fallback(fallback) => {
            let area = frame.area();
            draw_fallback(frame, area, &fallback);
            return;
        }
        Rendered::Ok(view) if view.is_empty && view.lines.is_empty() => {
            let [_, middle, _] = Layout::vertical([
                Constraint::Fill(1),
                Constraint::Length(1),
                Constraint::Fill(1),
            ])
            .areas(transcript_area);
            frame.render_widget(Paragraph::new(empty_state()), middle);
        }
        Rendered::Ok(view) => {
            let visible: Vec<Line<'static>> = view
                .lines
                .into_iter()
                .skip(view.top)
                .take(usize::from(transcript_area.height))
                .collect();
            frame.render_widget(Paragraph::new(visible), transcript_area);
        }
    }

    let panel = InputPanel::new(app.status());
    frame.render_stateful_widget(panel, input_area, app.input_mut());

    let status = StatusBar::new(app.status(), app.controller().context_mode())
        .with_copy_state(app.copy_state(now))
        .with_notice(app.notice().map(str::to_string));
    frame.render_widget(status, status_area);
}

fn draw_fallback(frame: &mut Frame<'_>, area: Rect, fallback: &Fallback) {
    let lines = vec![
        Line::styled(
            fallback.title,
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
        Line::default(),
        Line::raw(fallback.message),
        Line::default(),
        Line::styled(
            format!("Press r to {}", fallback.retry_label),
            Style::default().fg(Color::Cyan),
        ),
    ];
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red));
    frame.render_widget(
        Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false }),
        area,
    );
}
