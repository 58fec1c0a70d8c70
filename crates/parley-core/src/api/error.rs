use eventsource_stream::EventStreamError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SseParseError {
    #[error("UTF-8 error: {details}")]
    Utf8 { details: String },
    #[error("Parse error: {details}")]
    Parser { details: String },
    #[error("Transport error: {details}")]
    Transport { details: String },
}

impl<E> From<EventStreamError<E>> for SseParseError
where
    E: std::error::Error,
{
    fn from(err: EventStreamError<E>) -> Self {
        match err {
            EventStreamError::Utf8(err) => Self::Utf8 {
                details: err.to_string(),
            },
            EventStreamError::Parser(err) => Self::Parser {
                details: err.to_string(),
            },
            EventStreamError::Transport(err) => Self::Transport {
                details: err.to_string(),
            },
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Request cancelled")]
    Cancelled,

    #[error("SSE parse error: {0}")]
    SseParse(SseParseError),

    #[error("{provider} error: {message}")]
    Provider { provider: String, message: String },
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Authentication failed: {details}")]
    AuthenticationFailed { provider: String, details: String },

    #[error("Rate limited by {provider}: {details}")]
    RateLimited { provider: String, details: String },

    #[error("Invalid request to {provider}: {details}")]
    InvalidRequest { provider: String, details: String },

    #[error("{provider} server error (Status: {status_code}): {details}")]
    ServerError {
        provider: String,
        status_code: u16,
        details: String,
    },

    #[error("Request timed out for {provider}")]
    Timeout { provider: String },

    #[error("Request cancelled for {provider}")]
    Cancelled { provider: String },

    #[error("Failed to parse response from {provider}: {details}")]
    ResponseParsingError { provider: String, details: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Stream error from {provider}: {details}")]
    StreamError { provider: String, details: String },
}

impl ApiError {
    /// Classify a non-2xx upstream status.
    pub fn from_status(provider: &str, status_code: u16, details: String) -> Self {
        let provider = provider.to_string();
        match status_code {
            401 | 403 => ApiError::AuthenticationFailed { provider, details },
            429 => ApiError::RateLimited { provider, details },
            400 | 404 | 422 => ApiError::InvalidRequest { provider, details },
            408 | 504 => ApiError::Timeout { provider },
            _ => ApiError::ServerError {
                provider,
                status_code,
                details,
            },
        }
    }
}
