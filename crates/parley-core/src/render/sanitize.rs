//! Allow-list HTML sanitizer.
//!
//! Tags outside [`ALLOWED_TAGS`] are dropped but their text is kept.
//! Elements in [`DROPPED_WITH_CONTENT`] vanish entirely, text included.
//! Attributes survive only when [`allowed_attribute`] accepts them.

use super::html::escape_html;

pub const ALLOWED_TAGS: &[&str] = &[
    "p", "br", "hr", "h1", "h2", "h3", "h4", "h5", "h6", "strong", "em", "del", "code", "pre",
    "blockquote", "ul", "ol", "li", "a", "table", "thead", "tbody", "tr", "th", "td", "span",
    "div", "input",
];

pub const DROPPED_WITH_CONTENT: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "template", "noscript",
];

/// Content is raw text up to the first matching end tag, so nothing nests.
const RAW_TEXT_TAGS: &[&str] = &["script", "style", "iframe", "noscript"];

const VOID_TAGS: &[&str] = &["br", "hr", "input"];

const ALLOWED_URL_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// Sanitize an HTML fragment against the allow-list.
pub fn sanitize(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    // Name and nesting depth of the element whose content is being dropped
    let mut dropping: Option<(String, usize)> = None;
    let mut rest = html;

    while let Some(lt) = rest.find('<') {
        if dropping.is_none() {
            push_text(&mut out, &rest[..lt]);
        }
        rest = &rest[lt..];

        if let Some(after) = rest.strip_prefix("<!--") {
            rest = after.find("-->").map_or("", |end| &after[end + 3..]);
            continue;
        }

        let Some((tag, consumed)) = parse_tag(rest) else {
            if dropping.is_none() {
                out.push_str("&lt;");
            }
            rest = &rest[1..];
            continue;
        };
        rest = &rest[consumed..];

        if let Some((name, depth)) = dropping.as_mut() {
            if *name == tag.name {
                if tag.closing {
                    *depth -= 1;
                } else if !tag.self_closing && !RAW_TEXT_TAGS.contains(&name.as_str()) {
                    *depth += 1;
                }
            }
            if *depth == 0 {
                dropping = None;
            }
            continue;
        }

        if DROPPED_WITH_CONTENT.contains(&tag.name.as_str()) {
            if !tag.closing && !tag.self_closing {
                dropping = Some((tag.name, 1));
            }
            continue;
        }

        if !ALLOWED_TAGS.contains(&tag.name.as_str()) {
            continue;
        }

        if tag.closing {
            if !VOID_TAGS.contains(&tag.name.as_str()) {
                out.push_str("</");
                out.push_str(&tag.name);
                out.push('>');
            }
            continue;
        }

        if tag.name == "input"
            && !tag
                .attributes
                .iter()
                .any(|(k, v)| k == "type" && v.as_deref() == Some("checkbox"))
        {
            continue;
        }

        out.push('<');
        out.push_str(&tag.name);
        for (key, value) in &tag.attributes {
            if !allowed_attribute(&tag.name, key, value.as_deref()) {
                continue;
            }
            out.push(' ');
            out.push_str(key);
            if let Some(value) = value {
                out.push_str("=\"");
                out.push_str(&escape_attribute(value));
                out.push('"');
            }
        }
        if tag.name == "input" && !tag.attributes.iter().any(|(k, _)| k == "disabled") {
            out.push_str(" disabled");
        }
        out.push('>');
    }

    if dropping.is_none() {
        push_text(&mut out, rest);
    }
    out
}

/// Whether `attribute` may stay on `tag` with the given value.
pub fn allowed_attribute(tag: &str, attribute: &str, value: Option<&str>) -> bool {
    match (tag, attribute) {
        ("a", "href") => value.is_some_and(is_safe_url),
        ("code" | "span" | "pre" | "div", "class") => value.is_some_and(is_class_list),
        ("div", "data-copy") | ("ol", "start") => value.is_some_and(is_number),
        ("th" | "td", "align") => value.is_some_and(is_alignment),
        ("th" | "td", "style") => value
            .and_then(|v| v.trim().strip_prefix("text-align:"))
            .is_some_and(|v| is_alignment(v.trim().trim_end_matches(';'))),
        ("input", "type") => value == Some("checkbox"),
        ("input", "checked" | "disabled") => true,
        _ => false,
    }
}

fn is_number(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

fn is_alignment(value: &str) -> bool {
    matches!(value, "left" | "center" | "right")
}

fn is_class_list(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_'))
}

/// Relative URLs and the allowed schemes only. Encoded colons are rejected
/// outright since they can hide a scheme.
pub fn is_safe_url(url: &str) -> bool {
    let normalized: String = url
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();

    if normalized.contains("&#") || normalized.contains("&colon") {
        return false;
    }

    let scheme_end = normalized.find(':');
    let path_start = normalized.find(['/', '?', '#']);
    match (scheme_end, path_start) {
        (Some(colon), Some(path)) if path < colon => true,
        (Some(colon), _) => ALLOWED_URL_SCHEMES.contains(&&normalized[..colon]),
        (None, _) => true,
    }
}

struct ParsedTag {
    name: String,
    closing: bool,
    self_closing: bool,
    attributes: Vec<(String, Option<String>)>,
}

/// Parse the tag at the start of `input`, returning it and the bytes consumed.
fn parse_tag(input: &str) -> Option<(ParsedTag, usize)> {
    let bytes = input.as_bytes();
    let mut i = 1;
    let closing = bytes.get(i) == Some(&b'/');
    if closing {
        i += 1;
    }

    let name_start = i;
    if !bytes.get(i).is_some_and(u8::is_ascii_alphabetic) {
        return None;
    }
    while bytes
        .get(i)
        .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'-')
    {
        i += 1;
    }
    let name = input[name_start..i].to_ascii_lowercase();

    let mut attributes = Vec::new();
    let mut self_closing = false;
    loop {
        while bytes.get(i).is_some_and(u8::is_ascii_whitespace) {
            i += 1;
        }
        match bytes.get(i)? {
            b'>' => return Some((ParsedTag { name, closing, self_closing, attributes }, i + 1)),
            b'/' => {
                self_closing = true;
                i += 1;
                continue;
            }
            _ => {}
        }

        let key_start = i;
        while bytes
            .get(i)
            .is_some_and(|b| !b.is_ascii_whitespace() && !matches!(b, b'=' | b'>' | b'/'))
        {
            i += 1;
        }
        let key = input[key_start..i].to_ascii_lowercase();
        while bytes.get(i).is_some_and(u8::is_ascii_whitespace) {
            i += 1;
        }

        let mut value = None;
        if bytes.get(i) == Some(&b'=') {
            i += 1;
            while bytes.get(i).is_some_and(u8::is_ascii_whitespace) {
                i += 1;
            }
            match bytes.get(i)? {
                quote @ (b'"' | b'\'') => {
                    let start = i + 1;
                    let len = input[start..].find(char::from(*quote))?;
                    value = Some(input[start..start + len].to_string());
                    i = start + len + 1;
                }
                _ => {
                    let start = i;
                    while bytes.get(i).is_some_and(|b| !b.is_ascii_whitespace() && *b != b'>') {
                        i += 1;
                    }
                    value = Some(input[start..i].to_string());
                }
            }
        }

        if !key.is_empty() {
            self_closing = false;
            attributes.push((key, value));
        }
    }
}

fn push_text(out: &mut String, text: &str) {
    out.push_str(&text.replace('>', "&gt;"));
}

fn escape_attribute(value: &str) -> String {
    escape_html(value)
}
