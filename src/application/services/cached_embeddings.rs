use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{instrument, warn};

use crate::domain::{
    ports::{ByteStore, EmbeddingService},
    DomainError, Embedding,
};

/// Embedding provider backed by a durable byte store.
///
/// Document embeddings are looked up by the hash of their exact text inside
/// the namespace; only misses reach the provider, once per distinct text.
/// Query embeddings are never cached.
pub struct CachedEmbeddings {
    inner: Arc<dyn EmbeddingService>,
    store: Arc<dyn ByteStore>,
    namespace: String,
}

impl CachedEmbeddings {
    pub fn new(
        inner: Arc<dyn EmbeddingService>,
        store: Arc<dyn ByteStore>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            store,
            namespace: namespace.into(),
        }
    }

    pub fn cache_key(text: &str) -> String {
        hex::encode(Sha256::digest(text.as_bytes()))
    }

    fn decode(&self, key: &str, bytes: Option<Vec<u8>>) -> Option<Embedding> {
        let bytes = bytes?;
        match Embedding::from_bytes(&bytes) {
            Ok(embedding) => Some(embedding),
            Err(e) => {
                warn!(namespace = %self.namespace, key, error = %e, "discarding cache entry");
                None
            }
        }
    }
}

#[async_trait]
impl EmbeddingService for CachedEmbeddings {
    async fn embed(&self, text: &str) -> Result<Embedding, DomainError> {
        self.inner.embed(text).await
    }

    #[instrument(skip(self, texts), fields(namespace = %self.namespace, count = texts.len()))]
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, DomainError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let keys: Vec<String> = texts.iter().map(|t| Self::cache_key(t)).collect();
        let cached = self.store.mget(&self.namespace, &keys).await?;

        let mut results: Vec<Option<Embedding>> = keys
            .iter()
            .zip(cached)
            .map(|(key, bytes)| self.decode(key, bytes))
            .collect();

        let mut seen = HashSet::new();
        let (miss_keys, miss_texts): (Vec<&str>, Vec<&str>) = results
            .iter()
            .enumerate()
            .filter(|(i, slot)| slot.is_none() && seen.insert(keys[*i].as_str()))
            .map(|(i, _)| (keys[i].as_str(), texts[i]))
            .unzip();

        tracing::debug!(
            hits = texts.len() - results.iter().filter(|r| r.is_none()).count(),
            misses = miss_texts.len(),
            "embedding cache lookup"
        );

        if !miss_texts.is_empty() {
            let fresh = self.inner.embed_batch(&miss_texts).await?;
            if fresh.len() != miss_texts.len() {
                return Err(DomainError::provider(format!(
                    "expected {} embeddings, provider returned {}",
                    miss_texts.len(),
                    fresh.len()
                )));
            }

            let entries = miss_keys
                .iter()
                .zip(&fresh)
                .map(|(key, embedding)| Ok((key.to_string(), embedding.to_bytes()?)))
                .collect::<Result<Vec<_>, DomainError>>()?;
            self.store.mset(&self.namespace, &entries).await?;

            let by_key: HashMap<&str, &Embedding> =
                miss_keys.iter().copied().zip(fresh.iter()).collect();
            for (slot, key) in results.iter_mut().zip(&keys) {
                if slot.is_none() {
                    *slot = by_key.get(key.as_str()).map(|e| (*e).clone());
                }
            }
        }

        results
            .into_iter()
            .map(|slot| slot.ok_or_else(|| DomainError::internal("embedding missing after fill")))
            .collect()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }
}
