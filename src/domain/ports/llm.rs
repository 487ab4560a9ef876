use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;

/// Ordered fragments of a generated answer, as the provider emits them.
pub type TokenStream = BoxStream<'static, Result<String, DomainError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Starts a streamed completion. Errors before the first token are
    /// returned here; later ones arrive as stream items.
    async fn stream(&self, messages: &[PromptMessage]) -> Result<TokenStream, DomainError>;
    fn model(&self) -> &str;
}
