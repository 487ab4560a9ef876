use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;
use tracing::instrument;

use super::sse::SseDecoder;
use crate::domain::{
    ports::{ChatModel, PromptMessage, TokenStream},
    DomainError,
};
use crate::infrastructure::config::LlmConfig;
use crate::infrastructure::http::{check_status, endpoint, transport_error};

/// Streaming client for `POST {base}/chat/completions`.
pub struct OpenAiChat {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    error: Option<ChunkError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkError {
    message: String,
}

#[derive(Debug, PartialEq)]
enum ChatEvent {
    Token(String),
    Finished,
    Done,
    Empty,
}

fn parse_event(data: &str) -> Result<ChatEvent, DomainError> {
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(ChatEvent::Done);
    }
    let chunk: ChatChunk = serde_json::from_str(data)
        .map_err(|e| DomainError::provider(format!("malformed stream chunk: {e}")))?;
    if let Some(error) = chunk.error {
        return Err(DomainError::provider(error.message));
    }

    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(ChatEvent::Empty);
    };
    match choice.delta.content {
        Some(content) if !content.is_empty() => Ok(ChatEvent::Token(content)),
        _ if choice.finish_reason.is_some() => Ok(ChatEvent::Finished),
        _ => Ok(ChatEvent::Empty),
    }
}

impl OpenAiChat {
    pub fn new(client: Client, config: &LlmConfig, api_key: impl Into<String>) -> Self {
        Self {
            client,
            url: endpoint(&config.base_url, "chat/completions"),
            api_key: api_key.into(),
            model: config.model.clone(),
            temperature: config.temperature,
        }
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    #[instrument(skip(self, messages), fields(model = %self.model))]
    async fn stream(&self, messages: &[PromptMessage]) -> Result<TokenStream, DomainError> {
        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            stream: true,
        };
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;

        tracing::debug!("completion stream opened");
        Ok(token_stream(response.bytes_stream()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

struct StreamState<S> {
    body: Pin<Box<S>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, DomainError>>,
    finished: bool,
    closed: bool,
}

impl<S> StreamState<S> {
    /// Queues the tokens in `payloads`, stopping at the end marker or the
    /// first error.
    fn absorb(&mut self, payloads: Vec<String>) {
        for data in payloads {
            match parse_event(&data) {
                Ok(ChatEvent::Token(token)) => self.pending.push_back(Ok(token)),
                Ok(ChatEvent::Finished) => self.finished = true,
                Ok(ChatEvent::Empty) => {}
                Ok(ChatEvent::Done) => {
                    self.finished = true;
                    self.closed = true;
                    return;
                }
                Err(e) => {
                    self.pending.push_back(Err(e));
                    self.closed = true;
                    return;
                }
            }
        }
    }
}

/// Turns a raw SSE body into answer tokens.
fn token_stream<S, B, E>(body: S) -> TokenStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = StreamState {
        body: Box::pin(body),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        finished: false,
        closed: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.closed {
                return None;
            }
            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let payloads = state.decoder.push(chunk.as_ref());
                    state.absorb(payloads);
                }
                Some(Err(e)) => {
                    state.closed = true;
                    state
                        .pending
                        .push_back(Err(DomainError::provider(format!("stream interrupted: {e}"))));
                }
                None => {
                    let payloads = state.decoder.finish().into_iter().collect();
                    state.absorb(payloads);
                    if !state.closed && !state.finished {
                        state.pending.push_back(Err(DomainError::provider(
                            "stream ended before the answer was complete",
                        )));
                    }
                    state.closed = true;
                }
            }
        }
    })
    .boxed()
}
