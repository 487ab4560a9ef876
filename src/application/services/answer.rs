use futures::StreamExt;
use tracing::instrument;

use crate::domain::{
    ports::{ChatModel, PromptMessage, TokenStream},
    DomainError,
};

pub const CONTEXT_PLACEHOLDER: &str = "{context}";

pub const DEFAULT_SYSTEM_PROMPT: &str = "Answer the question using ONLY the following context. \
If you don't know the answer, just say \"I don't know\". DON'T make anything up.\n\n\
Context: {context}";

/// Receives answer fragments as they arrive.
pub trait TokenSink: Send {
    fn on_token(&mut self, token: &str);

    /// Called once when the provider finishes the stream.
    fn on_complete(&mut self, _answer: &str) {}

    /// Called once when the stream fails part way.
    fn on_error(&mut self, _error: &DomainError) {}
}

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    system: String,
}

impl PromptTemplate {
    pub fn new(system: impl Into<String>) -> Result<Self, DomainError> {
        let system = system.into();
        if !system.contains(CONTEXT_PLACEHOLDER) {
            return Err(DomainError::validation(format!(
                "system prompt must contain {CONTEXT_PLACEHOLDER}"
            )));
        }
        Ok(Self { system })
    }

    pub fn render(&self, context: &str, question: &str) -> Vec<PromptMessage> {
        vec![
            PromptMessage::system(self.system.replace(CONTEXT_PLACEHOLDER, context)),
            PromptMessage::user(question),
        ]
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Forwards tokens to a sink in arrival order while building the full answer.
pub struct AnswerAccumulator<'a> {
    sink: &'a mut dyn TokenSink,
    text: String,
}

impl<'a> AnswerAccumulator<'a> {
    pub fn new(sink: &'a mut dyn TokenSink) -> Self {
        Self {
            sink,
            text: String::new(),
        }
    }

    /// Drains the stream. Tokens already forwarded stay forwarded if the
    /// stream fails part way.
    pub async fn consume(mut self, mut stream: TokenStream) -> Result<String, DomainError> {
        while let Some(item) = stream.next().await {
            let token = match item {
                Ok(token) => token,
                Err(e) => {
                    self.sink.on_error(&e);
                    return Err(e);
                }
            };
            if token.is_empty() {
                continue;
            }
            self.text.push_str(&token);
            self.sink.on_token(&token);
        }
        self.sink.on_complete(&self.text);
        Ok(self.text)
    }
}

pub struct AnswerGenerator {
    template: PromptTemplate,
}

impl AnswerGenerator {
    pub fn new(template: PromptTemplate) -> Self {
        Self { template }
    }

    #[instrument(skip(self, model, context, sink), fields(model = model.model(), context_len = context.len()))]
    pub async fn generate(
        &self,
        model: &dyn ChatModel,
        context: &str,
        question: &str,
        sink: &mut dyn TokenSink,
    ) -> Result<String, DomainError> {
        let messages = self.template.render(context, question);
        let stream = model.stream(&messages).await?;
        let answer = AnswerAccumulator::new(sink).consume(stream).await?;

        tracing::debug!(answer_len = answer.len(), "answer streamed");
        Ok(answer)
    }
}

impl Default for AnswerGenerator {
    fn default() -> Self {
        Self::new(PromptTemplate::default())
    }
}
