use std::sync::Arc;
use tracing::instrument;

use crate::domain::{
    ports::DocumentStore, Document, DocumentChunk, DocumentLoader, DomainError, TextSplitter,
};

/// Turns an upload into a stored document and its chunks.
pub struct DocumentService {
    store: Arc<dyn DocumentStore>,
    splitter: Arc<TextSplitter>,
}

impl DocumentService {
    pub fn new(store: Arc<dyn DocumentStore>, splitter: TextSplitter) -> Self {
        Self {
            store,
            splitter: Arc::new(splitter),
        }
    }

    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn ingest(
        &self,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<(Document, Vec<DocumentChunk>), DomainError> {
        let doc = Document::new(name, bytes)?;
        self.store.save_document(&doc).await?;

        let loader = DocumentLoader::for_document(&doc);
        let splitter = self.splitter.clone();
        let bytes = doc.bytes.clone();
        let doc_id = doc.id;

        // Extraction and tokenization are CPU-bound.
        let chunks = tokio::task::spawn_blocking(move || {
            let segments = loader.extract(&bytes)?;
            Ok::<_, DomainError>(splitter.split_segments(doc_id, &segments))
        })
        .await
        .map_err(|e| DomainError::internal(format!("extraction task failed: {e}")))??;

        if chunks.is_empty() {
            return Err(DomainError::load("document produced no chunks"));
        }

        tracing::info!(
            document_id = %doc.id,
            format = doc.format.as_str(),
            chunks = chunks.len(),
            "document ingested"
        );
        Ok((doc, chunks))
    }
}
