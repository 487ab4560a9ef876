use std::sync::Arc;

use crate::domain::{errors::DomainError, Credential};

use super::{ChatModel, EmbeddingService};

/// Builds provider clients for the credential a session holds.
pub trait ProviderFactory: Send + Sync {
    fn embeddings(&self, credential: &Credential) -> Result<Arc<dyn EmbeddingService>, DomainError>;
    fn chat_model(&self, credential: &Credential) -> Result<Arc<dyn ChatModel>, DomainError>;
}
