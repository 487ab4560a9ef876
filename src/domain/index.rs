use std::cmp::Ordering;

use crate::domain::{errors::DomainError, DocumentChunk, Embedding, SearchResult};

/// Immutable cosine-similarity index over one document's chunks.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    entries: Vec<(DocumentChunk, Embedding)>,
}

impl VectorIndex {
    pub fn build(
        chunks: Vec<DocumentChunk>,
        embeddings: Vec<Embedding>,
    ) -> Result<Self, DomainError> {
        if chunks.len() != embeddings.len() {
            return Err(DomainError::internal(format!(
                "got {} embeddings for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        Ok(Self {
            entries: chunks.into_iter().zip(embeddings).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the `min(top_k, len)` most similar chunks, best first.
    /// Equal scores keep chunk order. There is no similarity floor.
    pub fn search(&self, query: &Embedding, top_k: usize) -> Vec<SearchResult> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, (_, embedding))| (position, query.cosine_similarity(embedding)))
            .collect();

        // Stable sort keeps insertion order for ties.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        scored
            .into_iter()
            .take(top_k)
            .map(|(position, score)| SearchResult {
                chunk: self.entries[position].0.clone(),
                score,
            })
            .collect()
    }
}
