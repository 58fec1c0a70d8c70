use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag};
use serde_json::Value;

use super::code::CodeBlock;
use super::highlight::highlight_html;
use super::sanitize::sanitize;

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

/// First word of a fence info string, e.g. `rust` for "```rust ignore".
pub fn fence_language(kind: &CodeBlockKind<'_>) -> Option<String> {
    match kind {
        CodeBlockKind::Fenced(info) => info
            .split_whitespace()
            .next()
            .map(str::to_string)
            .filter(|l| !l.is_empty()),
        CodeBlockKind::Indented => None,
    }
}

/// Render assistant markdown to sanitized HTML.
///
/// Fenced code is highlighted and wrapped in a `div` whose `data-copy`
/// attribute indexes into the returned code blocks, numbered from
/// `first_index`. Images render as their alt text.
pub fn markdown_to_html(markdown: &str, first_index: usize) -> (String, Vec<CodeBlock>) {
    let mut events = Vec::new();
    let mut blocks = Vec::new();
    let mut current: Option<(Option<String>, String)> = None;

    for event in Parser::new_ext(markdown, markdown_options()) {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                current = Some((fence_language(&kind), String::new()));
            }
            Event::Text(text) if current.is_some() => {
                if let Some((_, code)) = current.as_mut() {
                    code.push_str(&text);
                }
            }
            Event::End(Tag::CodeBlock(_)) => {
                let Some((language, code)) = current.take() else {
                    continue;
                };
                let index = first_index + blocks.len();
                let class = language
                    .as_deref()
                    .map(|l| format!(" class=\"language-{}\"", escape_html(l)))
                    .unwrap_or_default();
                let html = format!(
                    "<div class=\"code-block\" data-copy=\"{index}\"><pre class=\"code\"><code{class}>{}</code></pre></div>\n",
                    highlight_html(&code, language.as_deref())
                );
                events.push(Event::Html(html.into()));
                blocks.push(CodeBlock::new(language, &code));
            }
            Event::Start(Tag::Image(..)) | Event::End(Tag::Image(..)) => {}
            other => events.push(other),
        }
    }

    let mut html = String::with_capacity(markdown.len() * 2);
    pulldown_cmark::html::push_html(&mut html, events.into_iter());
    (sanitize(&html), blocks)
}

/// User text is shown literally, never interpreted as markup.
pub fn user_text_html(text: &str) -> String {
    format!("<pre class=\"user-text\">{}</pre>\n", escape_html(text))
}

/// A labelled panel holding pretty-printed JSON.
pub fn tool_panel_html(label: &str, kind: &str, sections: &[(Option<&str>, &Value)]) -> String {
    let mut html = format!(
        "<div class=\"tool-panel {kind}\"><div class=\"tool-label\">{}</div>",
        escape_html(label)
    );
    for (caption, value) in sections {
        if let Some(caption) = caption {
            html.push_str(&format!("<p class=\"tool-caption\">{}</p>", escape_html(caption)));
        }
        let json = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        html.push_str(&format!("<pre class=\"tool-json\">{}</pre>", escape_html(&json)));
    }
    html.push_str("</div>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bold_survives_and_script_is_removed() {
        let (html, _) = markdown_to_html("**bold** <script>alert(1)</script>", 0);
        assert!(html.contains("<strong>bold</strong>"));
        assert!(!html.contains("script"));
        assert!(!html.contains("alert(1)"));
    }

    #[test]
    fn block_level_script_is_removed() {
        let (html, _) = markdown_to_html("before\n\n<script>\nalert(1)\n</script>\n\nafter", 0);
        assert!(html.contains("before"));
        assert!(html.contains("after"));
        assert!(!html.contains("alert"));
    }

    #[test]
    fn fenced_code_is_highlighted_and_indexed() {
        let (html, blocks) = markdown_to_html("Run:\n\n```js\nconsole.log(1)\n```\n", 2);
        assert!(html.contains("data-copy=\"2\""));
        assert!(html.contains("class=\"language-js\""));
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].code, "console.log(1)");
        assert_eq!(blocks[0].language.as_deref(), Some("js"));
    }

    #[test]
    fn gfm_extensions_render() {
        let (html, _) = markdown_to_html("~~old~~\n\n- [x] done\n\n| a |\n|---|\n| 1 |\n", 0);
        assert!(html.contains("<del>old</del>"));
        assert!(html.contains("type=\"checkbox\""));
        assert!(html.contains("<table>"));
    }

    #[test]
    fn javascript_links_lose_their_href() {
        let (html, _) = markdown_to_html("[click](javascript:alert(1))", 0);
        assert!(!html.contains("javascript"));
        assert!(html.contains("click"));
    }

    #[test]
    fn user_text_is_escaped_literally() {
        assert_eq!(
            user_text_html("**not bold** <b>"),
            "<pre class=\"user-text\">**not bold** &lt;b&gt;</pre>\n"
        );
    }

    #[test]
    fn tool_panel_pretty_prints_json() {
        let html = tool_panel_html(
            "Weather Data",
            "tool-result",
            &[(Some("Result:"), &json!({"temperature": 72}))],
        );
        assert!(html.contains("<div class=\"tool-label\">Weather Data</div>"));
        assert!(html.contains("&quot;temperature&quot;: 72"));
    }
}
