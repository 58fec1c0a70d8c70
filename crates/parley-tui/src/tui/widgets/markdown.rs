//! Markdown to styled terminal lines.
//!
//! Walks pulldown-cmark events and emits ratatui lines. Fenced code is
//! highlighted with syntect; images collapse to their alt text and raw HTML
//! is shown as inert text.

use once_cell::sync::Lazy;
use pulldown_cmark::{Alignment, CodeBlockKind, CowStr, Event, HeadingLevel, Parser, Tag};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;
use tracing::debug;
use unicode_width::UnicodeWidthStr;

use parley_core::render::{fence_language, markdown_options};

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

const SYNTAX_THEME: &str = "base16-ocean.dark";

fn syntax_theme() -> Option<&'static Theme> {
    THEME_SET.themes.get(SYNTAX_THEME)
}

fn syntect_style_to_ratatui(style: syntect::highlighting::Style) -> Style {
    Style::default().fg(Color::Rgb(
        style.foreground.r,
        style.foreground.g,
        style.foreground.b,
    ))
}

/// Drop control characters so model output cannot emit escape sequences.
/// Tabs become spaces.
pub fn strip_controls(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '\t' => Some(' '),
            c if c.is_control() && c != '\n' => None,
            c => Some(c),
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct MarkdownStyles {
    pub h1: Style,
    pub h2: Style,
    pub h3: Style,
    pub emphasis: Style,
    pub strong: Style,
    pub strikethrough: Style,
    pub blockquote: Style,
    pub code: Style,
    pub code_block: Style,
    pub code_header: Style,
    pub link: Style,
    pub list_marker: Style,
    pub table_border: Style,
    pub table_header: Style,
    pub html: Style,
}

impl Default for MarkdownStyles {
    fn default() -> Self {
        Self {
            h1: Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            h2: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            h3: Style::default().add_modifier(Modifier::BOLD),
            emphasis: Style::default().add_modifier(Modifier::ITALIC),
            strong: Style::default().add_modifier(Modifier::BOLD),
            strikethrough: Style::default().add_modifier(Modifier::CROSSED_OUT),
            blockquote: Style::default()
                .fg(Color::Gray)
                .add_modifier(Modifier::ITALIC),
            code: Style::default().fg(Color::Yellow),
            code_block: Style::default(),
            code_header: Style::default().fg(Color::DarkGray),
            link: Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::UNDERLINED),
            list_marker: Style::default().fg(Color::Cyan),
            table_border: Style::default().fg(Color::DarkGray),
            table_header: Style::default().add_modifier(Modifier::BOLD),
            html: Style::default().fg(Color::DarkGray),
        }
    }
}

/// Render `input` to lines. Code blocks are numbered from `first_block`,
/// matching the order of `extract_code_blocks`.
pub fn render(input: &str, styles: &MarkdownStyles, first_block: usize) -> Vec<Line<'static>> {
    let parser = Parser::new_ext(input, markdown_options());
    let mut writer = TextWriter::new(styles, first_block);
    for event in parser {
        writer.handle_event(event);
    }
    writer.lines
}

struct TextWriter<'s> {
    lines: Vec<Line<'static>>,
    styles: &'s MarkdownStyles,

    /// Inline style stack; the top entry is the current style.
    inline_styles: Vec<Style>,
    /// Prefixes repeated at the start of each line, e.g. blockquote bars.
    line_prefixes: Vec<Span<'static>>,
    /// Current list index per nesting level; `None` for bullets.
    list_indices: Vec<Option<u64>>,
    link: Option<String>,
    needs_newline: bool,

    in_code_block: bool,
    code_language: Option<String>,
    next_block: usize,

    in_image: bool,

    table_alignments: Vec<Alignment>,
    table_rows: Vec<Vec<String>>,
    in_table: bool,
}

impl<'s> TextWriter<'s> {
    fn new(styles: &'s MarkdownStyles, first_block: usize) -> Self {
        Self {
            lines: Vec::new(),
            styles,
            inline_styles: Vec::new(),
            line_prefixes: Vec::new(),
            list_indices: Vec::new(),
            link: None,
            needs_newline: false,
            in_code_block: false,
            code_language: None,
            next_block: first_block,
            in_image: false,
            table_alignments: Vec::new(),
            table_rows: Vec::new(),
            in_table: false,
        }
    }

    fn handle_event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) if self.in_table => self.text(&code),
            Event::Code(code) => {
                let span = Span::styled(strip_controls(&code), self.styles.code);
                self.push_span(span);
            }
            Event::Html(html) => {
                debug!(target: "tui.markdown", "Showing raw html as text");
                let style = self.styles.html;
                for (idx, line) in strip_controls(&html).lines().enumerate() {
                    if idx > 0 {
                        self.push_line(Line::default());
                    }
                    self.push_span(Span::styled(line.to_string(), style));
                }
            }
            Event::FootnoteReference(reference) => self.text(&reference),
            Event::SoftBreak | Event::HardBreak => self.push_line(Line::default()),
            Event::Rule => {
                self.break_paragraph();
                self.push_line(Line::styled("─".repeat(40), self.styles.table_border));
                self.needs_newline = true;
            }
            Event::TaskListMarker(checked) => {
                let marker = if checked { "[x] " } else { "[ ] " };
                self.push_span(Span::styled(marker, self.styles.list_marker));
            }
        }
    }

    fn start_tag(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                if self.list_indices.is_empty() {
                    self.break_paragraph();
                    self.push_line(Line::default());
                }
            }
            Tag::Heading(level, _, _) => {
                self.break_paragraph();
                let style = match level {
                    HeadingLevel::H1 => self.styles.h1,
                    HeadingLevel::H2 => self.styles.h2,
                    _ => self.styles.h3,
                };
                self.push_inline_style(style);
                self.push_line(Line::default());
            }
            Tag::BlockQuote => {
                self.break_paragraph();
                self.line_prefixes
                    .push(Span::styled("│ ", self.styles.blockquote));
                self.push_inline_style(self.styles.blockquote);
            }
            Tag::CodeBlock(kind) => self.start_codeblock(&kind),
            Tag::List(start) => {
                if self.list_indices.is_empty() {
                    self.break_paragraph();
                }
                self.list_indices.push(start);
            }
            Tag::Item => self.start_item(),
            Tag::FootnoteDefinition(_) => {}
            Tag::Table(alignments) => {
                self.break_paragraph();
                self.table_alignments = alignments;
                self.table_rows.clear();
                self.in_table = true;
            }
            Tag::TableHead | Tag::TableRow => self.table_rows.push(Vec::new()),
            Tag::TableCell => {
                if let Some(row) = self.table_rows.last_mut() {
                    row.push(String::new());
                }
            }
            Tag::Emphasis => self.push_inline_style(self.styles.emphasis),
            Tag::Strong => self.push_inline_style(self.styles.strong),
            Tag::Strikethrough => self.push_inline_style(self.styles.strikethrough),
            Tag::Link(_, dest, _) => self.link = Some(strip_controls(&dest)),
            Tag::Image(..) => self.in_image = true,
        }
    }

    fn end_tag(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => self.needs_newline = true,
            Tag::Heading(..) => {
                self.inline_styles.pop();
                self.needs_newline = true;
            }
            Tag::BlockQuote => {
                self.line_prefixes.pop();
                self.inline_styles.pop();
                self.needs_newline = true;
            }
            Tag::CodeBlock(_) => {
                self.in_code_block = false;
                self.code_language = None;
                self.needs_newline = true;
            }
            Tag::List(_) => {
                self.list_indices.pop();
                self.needs_newline = true;
            }
            Tag::Item | Tag::FootnoteDefinition(_) => {}
            Tag::Table(_) => {
                self.render_table();
                self.in_table = false;
                self.needs_newline = true;
            }
            Tag::TableHead | Tag::TableRow | Tag::TableCell => {}
            Tag::Emphasis | Tag::Strong | Tag::Strikethrough => {
                self.inline_styles.pop();
            }
            Tag::Link(..) => {
                if let Some(link) = self.link.take() {
                    self.push_span(" (".into());
                    self.push_span(Span::styled(link, self.styles.link));
                    self.push_span(")".into());
                }
            }
            Tag::Image(..) => self.in_image = false,
        }
    }

    fn text(&mut self, text: &CowStr<'_>) {
        let text = strip_controls(text);

        if self.in_table {
            if let Some(cell) = self.table_rows.last_mut().and_then(|row| row.last_mut()) {
                cell.push_str(&text);
            }
            return;
        }

        if self.in_code_block {
            self.code_text(&text);
            return;
        }

        let style = if self.in_image {
            self.current_style().add_modifier(Modifier::ITALIC)
        } else {
            self.current_style()
        };
        for (idx, line) in text.split('\n').enumerate() {
            if idx > 0 {
                self.push_line(Line::default());
            }
            if !line.is_empty() {
                self.push_span(Span::styled(line.to_string(), style));
            }
        }
    }

    fn start_codeblock(&mut self, kind: &CodeBlockKind<'_>) {
        self.break_paragraph();
        self.in_code_block = true;
        self.code_language = fence_language(kind);

        let index = self.next_block;
        self.next_block += 1;
        let header = format!(
            "╭─ [{}] {} ",
            index + 1,
            self.code_language.as_deref().unwrap_or("text")
        );
        self.push_line(Line::styled(header, self.styles.code_header));
    }

    fn code_text(&mut self, text: &str) {
        let base = self.styles.code_block;
        let syntax = self
            .code_language
            .as_deref()
            .and_then(|lang| {
                SYNTAX_SET
                    .find_syntax_by_token(lang)
                    .or_else(|| SYNTAX_SET.find_syntax_by_extension(lang))
            })
            .unwrap_or_else(|| SYNTAX_SET.find_syntax_plain_text());
        let mut highlighter = syntax_theme().map(|theme| HighlightLines::new(syntax, theme));

        for line in LinesWithEndings::from(text) {
            let mut spans = vec![Span::styled("│ ", self.styles.code_header)];
            let highlighted = highlighter
                .as_mut()
                .and_then(|h| h.highlight_line(line, &SYNTAX_SET).ok());
            match highlighted {
                Some(ranges) => {
                    for (style, piece) in ranges {
                        let piece = piece.trim_end_matches('\n');
                        if !piece.is_empty() {
                            spans.push(Span::styled(
                                piece.to_string(),
                                syntect_style_to_ratatui(style).patch(base),
                            ));
                        }
                    }
                }
                None => spans.push(Span::styled(
                    line.trim_end_matches('\n').to_string(),
                    base,
                )),
            }
            self.push_line(Line::from(spans));
        }
    }

    fn start_item(&mut self) {
        let depth = self.list_indices.len().saturating_sub(1);
        let marker = match self.list_indices.last_mut() {
            Some(Some(index)) => {
                let marker = format!("{index}. ");
                *index += 1;
                marker
            }
            _ => "• ".to_string(),
        };
        self.push_line(Line::from(vec![
            Span::raw("  ".repeat(depth)),
            Span::styled(marker, self.styles.list_marker),
        ]));
        self.needs_newline = false;
    }

    fn break_paragraph(&mut self) {
        if self.needs_newline {
            self.push_line(Line::default());
            self.needs_newline = false;
        }
    }

    fn current_style(&self) -> Style {
        self.inline_styles.last().copied().unwrap_or_default()
    }

    fn push_inline_style(&mut self, style: Style) {
        let style = self.current_style().patch(style);
        self.inline_styles.push(style);
    }

    fn push_line(&mut self, mut line: Line<'static>) {
        for prefix in self.line_prefixes.iter().rev() {
            line.spans.insert(0, prefix.clone());
        }
        self.lines.push(line);
    }

    fn push_span(&mut self, span: Span<'static>) {
        if let Some(line) = self.lines.last_mut() {
            line.push_span(span);
        } else {
            self.push_line(Line::from(vec![span]));
        }
    }

    fn render_table(&mut self) {
        let rows = std::mem::take(&mut self.table_rows);
        if rows.is_empty() {
            return;
        }

        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        let mut widths = vec![0usize; columns];
        for row in &rows {
            for (col, cell) in row.iter().enumerate() {
                widths[col] = widths[col].max(cell.width());
            }
        }

        let border = self.styles.table_border;
        for (row_idx, row) in rows.iter().enumerate() {
            let style = if row_idx == 0 {
                self.styles.table_header
            } else {
                Style::default()
            };
            let mut spans = vec![Span::styled("│", border)];
            for (col, width) in widths.iter().enumerate() {
                let cell = row.get(col).map_or("", String::as_str);
                let alignment = self
                    .table_alignments
                    .get(col)
                    .copied()
                    .unwrap_or(Alignment::None);
                spans.push(Span::styled(align_cell(cell, *width, alignment), style));
                spans.push(Span::styled("│", border));
            }
            self.push_line(Line::from(spans));

            if row_idx == 0 && rows.len() > 1 {
                let rule: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
                self.push_line(Line::styled(format!("├{}┤", rule.join("┼")), border));
            }
        }
    }
}

fn align_cell(text: &str, width: usize, alignment: Alignment) -> String {
    let padding = width.saturating_sub(text.width());
    match alignment {
        Alignment::None | Alignment::Left => format!(" {text}{} ", " ".repeat(padding)),
        Alignment::Center => {
            let left = padding / 2;
            format!(" {}{text}{} ", " ".repeat(left), " ".repeat(padding - left))
        }
        Alignment::Right => format!(" {}{text} ", " ".repeat(padding)),
    }
}
