use std::convert::Infallible;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use parley_core::app::agent_executor::{AgentExecutorError, AgentExecutorRunRequest};
use parley_core::app::conversation::to_model_messages;
use parley_core::app::ui_stream::{DONE_MARKER, UI_STREAM_HEADER, UI_STREAM_VERSION, UiChunk};
use parley_core::app::validation::parse_chat_request;

use crate::error::{Result, ServerError};
use crate::state::AppState;

const CHUNK_BUFFER: usize = 64;

/// `POST /api/chat`
///
/// Validates the body, starts the agent loop and waits for its first chunk.
/// A run that fails before producing anything becomes a 500; once streaming
/// has begun, failures arrive in-band as an `error` chunk.
#[instrument(skip_all, name = "chat")]
pub async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Response> {
    let request = parse_chat_request(&body)?;
    info!(
        target: "parley_server::chat",
        messages = request.messages.len(),
        "Accepted chat request"
    );

    let run_request = AgentExecutorRunRequest {
        model: state.model.clone(),
        messages: to_model_messages(&request.messages),
        max_steps: state.max_steps,
    };

    let (tx, mut rx) = mpsc::channel::<UiChunk>(CHUNK_BUFFER);
    let token = CancellationToken::new();
    let executor = state.executor.clone();
    let run_token = token.clone();
    // Dropping the handler or the body (client disconnect) cancels the run
    let guard = token.drop_guard();

    let run = tokio::spawn(async move {
        match executor.run(run_request, tx, run_token).await {
            Ok(outcome) => {
                info!(
                    target: "parley_server::chat",
                    message_id = %outcome.message_id,
                    steps = outcome.steps,
                    "Chat run finished"
                );
                None
            }
            Err(AgentExecutorError::Cancelled) => {
                debug!(target: "parley_server::chat", "Chat run cancelled");
                None
            }
            Err(e) => {
                error!(target: "parley_server::chat", error = %e, "Chat run failed");
                Some(e.to_string())
            }
        }
    });

    let Some(first) = rx.recv().await else {
        let reason = run
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| "run produced no output".to_string());
        return Err(ServerError::RunFailed(reason));
    };

    let stream = async_stream::stream! {
        let _guard = guard;
        yield Ok::<_, Infallible>(Event::default().data(first.to_json()));
        while let Some(chunk) = rx.recv().await {
            yield Ok(Event::default().data(chunk.to_json()));
        }
        yield Ok(Event::default().data(DONE_MARKER));
    };

    let mut response = Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response();
    let headers = response.headers_mut();
    headers.insert(UI_STREAM_HEADER, HeaderValue::from_static(UI_STREAM_VERSION));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    Ok(response)
}

/// `GET /healthz`
pub async fn healthz() -> &'static str {
    "ok"
}
