use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::application::TokenSink;
use crate::domain::DomainError;

pub const TOKEN_EVENT: &str = "token";
pub const DONE_EVENT: &str = "done";
pub const ERROR_EVENT: &str = "error";

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Serialize)]
struct TokenPayload<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct DonePayload {
    answer: String,
}

#[derive(Serialize)]
struct ErrorPayload {
    error: String,
}

fn sse_event<T: Serialize>(name: &'static str, payload: &T) -> Event {
    Event::default()
        .event(name)
        .data(serde_json::to_string(payload).unwrap_or_default())
}

/// Forwards each token to the open event stream.
struct ChannelSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl TokenSink for ChannelSink {
    fn on_token(&mut self, token: &str) {
        let _ = self.tx.send(sse_event(TOKEN_EVENT, &TokenPayload { text: token }));
    }
}

/// Streams the answer as `token` events followed by one `done` or `error`.
/// Requests that cannot start are rejected with a plain JSON error instead.
pub async fn chat_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let shared = state.sessions.get(id)?;
    let mut session = shared
        .try_lock_owned()
        .map_err(|_| DomainError::conflict("A question is already being answered."))?;
    session.check_question(&request.message)?;

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut sink = ChannelSink { tx: tx.clone() };
        let outcome = tokio::select! {
            result = session.ask(&request.message, &mut sink) => Some(result),
            _ = tx.closed() => None,
        };

        match outcome {
            Some(Ok(answer)) => {
                let _ = tx.send(sse_event(DONE_EVENT, &DonePayload { answer }));
            }
            Some(Err(e)) => {
                let _ = tx.send(sse_event(
                    ERROR_EVENT,
                    &ErrorPayload {
                        error: e.user_message(),
                    },
                ));
            }
            None => session.interrupt(),
        }
    });

    let events = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (Ok(event), rx))
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
