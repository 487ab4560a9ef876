use async_trait::async_trait;

use crate::domain::errors::DomainError;

/// Durable key/value byte store partitioned by namespace.
#[async_trait]
pub trait ByteStore: Send + Sync {
    async fn mget(
        &self,
        namespace: &str,
        keys: &[String],
    ) -> Result<Vec<Option<Vec<u8>>>, DomainError>;
    async fn mset(&self, namespace: &str, entries: &[(String, Vec<u8>)])
        -> Result<(), DomainError>;
}
