use async_trait::async_trait;
use futures_core::Stream;
use futures_util::StreamExt;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::api::error::SseParseError;
use crate::api::sse::parse_sse_stream;
use crate::app::conversation::ChatMessage;
use crate::app::ui_stream::{UiChunk, decode_chunk};

pub type UiChunkStream = Pin<Box<dyn Stream<Item = Result<UiChunk, TransportError>> + Send>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Chat server returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Stream error: {0}")]
    Sse(#[from] SseParseError),

    #[error("Could not decode stream chunk: {0}")]
    Decode(String),

    #[error("Invalid chat endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Request was cancelled")]
    Cancelled,

    #[error("Connection closed before a response arrived")]
    Closed,
}

/// Opens one streaming chat request.
///
/// The returned stream yields UI chunks until the server's end marker;
/// dropping it (or cancelling `token`) aborts the request.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn open(
        &self,
        messages: Vec<ChatMessage>,
        token: CancellationToken,
    ) -> Result<UiChunkStream, TransportError>;
}

/// [`ChatTransport`] speaking the UI message stream over HTTP.
#[derive(Clone)]
pub struct HttpChatTransport {
    http_client: reqwest::Client,
    endpoint: Url,
}

impl HttpChatTransport {
    /// Only the connect phase is bounded; a streaming response may run as
    /// long as the server keeps it open.
    pub fn new(endpoint: &str, connect_timeout: Duration) -> Result<Self, TransportError> {
        let endpoint =
            Url::parse(endpoint).map_err(|e| TransportError::InvalidEndpoint(e.to_string()))?;
        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            http_client,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[derive(serde::Serialize)]
struct ChatRequestBody<'a> {
    messages: &'a [ChatMessage],
}

/// Pull a human-readable message out of an error response body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn open(
        &self,
        messages: Vec<ChatMessage>,
        token: CancellationToken,
    ) -> Result<UiChunkStream, TransportError> {
        let request = self
            .http_client
            .post(self.endpoint.clone())
            .json(&ChatRequestBody {
                messages: &messages,
            });

        let response = tokio::select! {
            biased;
            () = token.cancelled() => return Err(TransportError::Cancelled),
            res = request.send() => res?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(
                target: "HttpChatTransport::open",
                status = status.as_u16(),
                body = %body,
                "Chat request rejected"
            );
            return Err(TransportError::Http {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let mut events = parse_sse_stream(response.bytes_stream());
        let stream = async_stream::stream! {
            loop {
                let event = tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    event = events.next() => event,
                };

                match event {
                    Some(Ok(event)) => match decode_chunk(&event.data) {
                        Ok(Some(chunk)) => yield Ok(chunk),
                        Ok(None) => break,
                        Err(e) => {
                            warn!(
                                target: "HttpChatTransport::open",
                                data = %event.data,
                                "Undecodable chunk"
                            );
                            yield Err(TransportError::Decode(e.to_string()));
                            break;
                        }
                    },
                    Some(Err(e)) => {
                        yield Err(TransportError::Sse(e));
                        break;
                    }
                    None => break,
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(r#"{"error":"Invalid request","issues":[]}"#, "Invalid request")]
    #[case("upstream exploded\n", "upstream exploded")]
    #[case(r#"{"detail":"x"}"#, r#"{"detail":"x"}"#)]
    fn error_message_prefers_error_field(#[case] body: &str, #[case] expected: &str) {
        assert_eq!(error_message(body), expected);
    }

    #[test]
    fn rejects_malformed_endpoint() {
        let result = HttpChatTransport::new("not a url", Duration::from_secs(5));
        assert!(matches!(result, Err(TransportError::InvalidEndpoint(_))));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits_open() {
        let transport =
            HttpChatTransport::new("http://127.0.0.1:9/api/chat", Duration::from_secs(5)).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let result = transport.open(vec![ChatMessage::user("hi")], token).await;
        assert!(matches!(result, Err(TransportError::Cancelled)));
    }
}
