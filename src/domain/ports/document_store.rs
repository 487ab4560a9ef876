use async_trait::async_trait;
use crate::domain::{errors::DomainError, Document};

/// Scratch storage for uploaded files.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn save_document(&self, doc: &Document) -> Result<(), DomainError>;
}
