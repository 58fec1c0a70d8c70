/// Normalize a chat completions URL.
/// Ensures the URL ends with the correct path for chat completions.
pub fn normalize_chat_url(base_url: Option<&str>, default_url: &str) -> String {
    let base_url = base_url
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default_url)
        .to_string();

    if base_url.ends_with("/chat/completions") {
        return base_url;
    }

    if let Ok(mut parsed) = url::Url::parse(&base_url) {
        let path = parsed.path().trim_end_matches('/').to_string();

        if path.ends_with("/v1") {
            parsed.set_path(&format!("{path}/chat/completions"));
        } else if path.is_empty() {
            parsed.set_path("/v1/chat/completions");
        } else {
            // Gateways with a custom prefix already carry their version segment
            parsed.set_path(&format!("{path}/chat/completions"));
        }
        parsed.to_string()
    } else if base_url.ends_with('/') {
        format!("{base_url}chat/completions")
    } else {
        format!("{base_url}/chat/completions")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(
        Some("https://api-inference.modelscope.cn/v1"),
        "https://api-inference.modelscope.cn/v1/chat/completions"
    )]
    #[case(
        Some("https://api-inference.modelscope.cn/v1/"),
        "https://api-inference.modelscope.cn/v1/chat/completions"
    )]
    #[case(Some("https://api.example.com"), "https://api.example.com/v1/chat/completions")]
    #[case(
        Some("https://gateway.example.com/openai"),
        "https://gateway.example.com/openai/chat/completions"
    )]
    #[case(
        Some("https://api.example.com/v1/chat/completions"),
        "https://api.example.com/v1/chat/completions"
    )]
    #[case(None, "https://default.example.com/v1/chat/completions")]
    #[case(Some("  "), "https://default.example.com/v1/chat/completions")]
    fn test_normalize_chat_url(#[case] base_url: Option<&str>, #[case] expected: &str) {
        assert_eq!(
            normalize_chat_url(base_url, "https://default.example.com/v1"),
            expected
        );
    }
}
