use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use tracing::instrument;

use crate::application::services::CachedEmbeddings;
use crate::domain::{
    ports::{ByteStore, EmbeddingService},
    Document, DocumentChunk, DomainError, SearchResult, VectorIndex,
};

pub const DEFAULT_INDEX_MEMO_CAPACITY: usize = 16;

pub struct RagService {
    cache: Arc<dyn ByteStore>,
    default_top_k: usize,
    indexes: Mutex<LruCache<String, Arc<VectorIndex>>>,
}

impl RagService {
    pub fn new(cache: Arc<dyn ByteStore>, default_top_k: usize) -> Self {
        Self::with_memo_capacity(cache, default_top_k, DEFAULT_INDEX_MEMO_CAPACITY)
    }

    /// Keeps at most `capacity` built indexes, dropping the least recently
    /// used. Sessions holding an evicted index keep using it.
    pub fn with_memo_capacity(
        cache: Arc<dyn ByteStore>,
        default_top_k: usize,
        capacity: usize,
    ) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache,
            default_top_k,
            indexes: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn memo_key(doc: &Document) -> String {
        format!("{}:{}", doc.name, doc.content_hash)
    }

    fn memoised(&self, key: &str) -> Result<Option<Arc<VectorIndex>>, DomainError> {
        let mut indexes = self
            .indexes
            .lock()
            .map_err(|e| DomainError::internal(e.to_string()))?;
        Ok(indexes.get(key).cloned())
    }

    /// Embeds the chunks through the document's cache namespace and builds
    /// its index. Indexes are memoised per file name and content.
    #[instrument(skip(self, embeddings, doc, chunks), fields(document = %doc.name, count = chunks.len()))]
    pub async fn index_document(
        &self,
        embeddings: Arc<dyn EmbeddingService>,
        doc: &Document,
        chunks: Vec<DocumentChunk>,
    ) -> Result<Arc<VectorIndex>, DomainError> {
        let memo_key = Self::memo_key(doc);
        if let Some(index) = self.memoised(&memo_key)? {
            tracing::debug!("reusing memoised index");
            return Ok(index);
        }

        let cached = CachedEmbeddings::new(embeddings, self.cache.clone(), doc.name.as_str());
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let vectors = cached.embed_batch(&texts).await?;

        let index = Arc::new(VectorIndex::build(chunks, vectors)?);
        self.indexes
            .lock()
            .map_err(|e| DomainError::internal(e.to_string()))?
            .put(memo_key, index.clone());

        tracing::info!(chunks = index.len(), "index built");
        Ok(index)
    }

    #[instrument(skip(self, embeddings, index))]
    pub async fn retrieve(
        &self,
        embeddings: &dyn EmbeddingService,
        index: &VectorIndex,
        query: &str,
    ) -> Result<Vec<SearchResult>, DomainError> {
        self.retrieve_top_k(embeddings, index, query, self.default_top_k)
            .await
    }

    #[instrument(skip(self, embeddings, index))]
    pub async fn retrieve_top_k(
        &self,
        embeddings: &dyn EmbeddingService,
        index: &VectorIndex,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, DomainError> {
        let embedding = embeddings.embed(query).await?;
        Ok(index.search(&embedding, top_k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::KeywordEmbeddings;
    use crate::infrastructure::InMemoryByteStore;

    fn chunks(doc: &Document, texts: &[&str]) -> Vec<DocumentChunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| DocumentChunk::new(doc.id, *t, i))
            .collect()
    }

    #[tokio::test]
    async fn test_retrieve_finds_matching_chunk() {
        let embeddings = Arc::new(KeywordEmbeddings::new());
        let rag = RagService::new(Arc::new(InMemoryByteStore::new()), 1);
        let doc = Document::new("facts.txt", b"irrelevant".to_vec()).unwrap();

        let index = rag
            .index_document(
                embeddings.clone(),
                &doc,
                chunks(&doc, &["apple orchard", "zorblax mineral", "train station"]),
            )
            .await
            .unwrap();

        let results = rag
            .retrieve(embeddings.as_ref(), &index, "where is the train?")
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.content, "train station");
    }

    #[tokio::test]
    async fn test_retrieve_returns_min_k_and_len() {
        let embeddings = Arc::new(KeywordEmbeddings::new());
        let rag = RagService::new(Arc::new(InMemoryByteStore::new()), 4);
        let doc = Document::new("facts.txt", b"x".to_vec()).unwrap();
        let index = rag
            .index_document(embeddings.clone(), &doc, chunks(&doc, &["apple", "train"]))
            .await
            .unwrap();

        let results = rag
            .retrieve(embeddings.as_ref(), &index, "nothing relevant")
            .await
            .unwrap();
        assert_eq!(results.len(), 2);

        let results = rag
            .retrieve_top_k(embeddings.as_ref(), &index, "apple", 1)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_same_upload_reuses_index() {
        let embeddings = Arc::new(KeywordEmbeddings::new());
        let rag = RagService::new(Arc::new(InMemoryByteStore::new()), 4);
        let first = Document::new("facts.txt", b"same".to_vec()).unwrap();
        let second = Document::new("facts.txt", b"same".to_vec()).unwrap();

        let a = rag
            .index_document(embeddings.clone(), &first, chunks(&first, &["apple"]))
            .await
            .unwrap();
        let b = rag
            .index_document(embeddings.clone(), &second, chunks(&second, &["apple"]))
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(embeddings.batch_calls(), 1);
    }

    #[tokio::test]
    async fn test_memo_drops_least_recently_used_index() {
        let embeddings = Arc::new(KeywordEmbeddings::new());
        let rag = RagService::with_memo_capacity(Arc::new(InMemoryByteStore::new()), 4, 2);
        let docs: Vec<Document> = ["a.txt", "b.txt", "c.txt"]
            .iter()
            .map(|name| Document::new(*name, name.as_bytes().to_vec()).unwrap())
            .collect();

        let mut built = Vec::new();
        for doc in &docs {
            let index = rag
                .index_document(embeddings.clone(), doc, chunks(doc, &["apple"]))
                .await
                .unwrap();
            built.push(index);
        }

        let c = rag
            .index_document(embeddings.clone(), &docs[2], chunks(&docs[2], &["apple"]))
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&c, &built[2]));

        let a = rag
            .index_document(embeddings.clone(), &docs[0], chunks(&docs[0], &["apple"]))
            .await
            .unwrap();
        assert!(!Arc::ptr_eq(&a, &built[0]));
        // Rebuilt from the embedding cache, not the provider.
        assert_eq!(embeddings.batch_calls(), 3);
    }
}
