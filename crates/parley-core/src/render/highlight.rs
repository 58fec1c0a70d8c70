use once_cell::sync::Lazy;
use syntect::highlighting::ThemeSet;
use syntect::html::{ClassStyle, ClassedHTMLGenerator, css_for_theme_with_class_style};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;
use tracing::warn;

use super::html::escape_html;

/// Lazy-loaded syntax set for highlighting
static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

pub const DEFAULT_THEME: &str = "InspiredGitHub";

fn find_syntax(language: Option<&str>) -> &'static SyntaxReference {
    language
        .filter(|l| !l.is_empty())
        .and_then(|lang| {
            SYNTAX_SET
                .find_syntax_by_token(lang)
                .or_else(|| SYNTAX_SET.find_syntax_by_extension(lang))
        })
        .unwrap_or_else(|| SYNTAX_SET.find_syntax_plain_text())
}

/// Highlight `code` into class-annotated `<span>`s.
///
/// Falls back to escaped plain text if the highlighter rejects a line.
pub fn highlight_html(code: &str, language: Option<&str>) -> String {
    let syntax = find_syntax(language);
    let mut generator =
        ClassedHTMLGenerator::new_with_class_style(syntax, &SYNTAX_SET, ClassStyle::Spaced);

    for line in LinesWithEndings::from(code) {
        if let Err(e) = generator.parse_html_for_line_which_includes_newline(line) {
            warn!(
                target: "render::highlight",
                error = %e,
                language = ?language,
                "Highlighting failed"
            );
            return escape_html(code);
        }
    }
    generator.finalize()
}

/// Stylesheet matching the classes emitted by [`highlight_html`].
pub fn highlight_css(theme_name: &str) -> String {
    let Some(theme) = THEME_SET
        .themes
        .get(theme_name)
        .or_else(|| THEME_SET.themes.get(DEFAULT_THEME))
    else {
        return String::new();
    };
    css_for_theme_with_class_style(theme, ClassStyle::Spaced).unwrap_or_else(|e| {
        warn!(target: "render::highlight", error = %e, "Could not build highlight stylesheet");
        String::new()
    })
}
