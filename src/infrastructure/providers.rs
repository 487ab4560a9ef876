use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::{
    ports::{ChatModel, EmbeddingService, ProviderFactory},
    Credential, DomainError,
};
use crate::infrastructure::config::{EmbeddingConfig, LlmConfig};
use crate::infrastructure::http::{request_client, streaming_client};
use crate::infrastructure::{OpenAiChat, OpenAiEmbeddings};

/// Builds OpenAI clients bound to a session's key. The HTTP connection pools
/// are shared by every session.
pub struct OpenAiProviders {
    requests: Client,
    streams: Client,
    llm: LlmConfig,
    embedding: EmbeddingConfig,
}

impl OpenAiProviders {
    pub fn new(llm: LlmConfig, embedding: EmbeddingConfig) -> Result<Self, DomainError> {
        let timeout = Duration::from_secs(llm.timeout_seconds);
        Ok(Self {
            requests: request_client(timeout)?,
            streams: streaming_client(timeout)?,
            llm,
            embedding,
        })
    }
}

impl ProviderFactory for OpenAiProviders {
    fn embeddings(&self, credential: &Credential) -> Result<Arc<dyn EmbeddingService>, DomainError> {
        let key = credential.require()?;
        Ok(Arc::new(OpenAiEmbeddings::new(
            self.requests.clone(),
            &self.llm.base_url,
            &self.embedding,
            key,
        )))
    }

    fn chat_model(&self, credential: &Credential) -> Result<Arc<dyn ChatModel>, DomainError> {
        let key = credential.require()?;
        Ok(Arc::new(OpenAiChat::new(self.streams.clone(), &self.llm, key)))
    }
}
