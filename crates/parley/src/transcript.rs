use std::path::Path;

use eyre::{Result, WrapErr};
use serde_json::{Value, json};

use parley_core::app::conversation::ChatMessage;
use parley_core::app::validation::validate_chat_request;

/// Read a transcript file, validating it the same way the chat endpoint
/// validates request bodies. Accepts a bare message array or an object with
/// a `messages` field.
pub fn load_transcript(path: &Path) -> Result<Vec<ChatMessage>> {
    let raw = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read transcript {}", path.display()))?;
    parse_transcript(&raw).wrap_err_with(|| format!("Invalid transcript {}", path.display()))
}

pub fn parse_transcript(raw: &str) -> Result<Vec<ChatMessage>> {
    let value: Value = serde_json::from_str(raw)?;
    let body = match value {
        Value::Array(_) => json!({ "messages": value }),
        other => other,
    };
    Ok(validate_chat_request(&body)?.messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::app::conversation::Role;

    const MESSAGES: &str =
        r#"[{"id": "u1", "role": "user", "parts": [{"type": "text", "text": "hi"}]}]"#;

    #[test]
    fn accepts_array_and_wrapped_forms() {
        let bare = parse_transcript(MESSAGES).unwrap();
        let wrapped = parse_transcript(&format!(r#"{{"messages": {MESSAGES}}}"#)).unwrap();
        assert_eq!(bare, wrapped);
        assert_eq!(bare[0].role, Role::User);
        assert_eq!(bare[0].text(), "hi");
    }

    #[test]
    fn rejects_invalid_messages() {
        let err = parse_transcript(r#"[{"id": "u1", "role": "robot", "parts": []}]"#).unwrap_err();
        assert!(err.to_string().contains("Invalid request"));
    }

    #[test]
    fn reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_transcript(&dir.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read transcript"));
    }
}
