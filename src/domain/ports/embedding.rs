use crate::domain::{errors::DomainError, Embedding};
use async_trait::async_trait;

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embeds a single query text. Never cached.
    async fn embed(&self, text: &str) -> Result<Embedding, DomainError>;
    /// Embeds document texts, returning one embedding per input in order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError>;
    fn model(&self) -> &str;
}
