use async_trait::async_trait;
use std::path::PathBuf;

use crate::domain::{ports::DocumentStore, Document, DomainError};

/// Keeps each upload at `<root>/<file name>`, replacing earlier uploads of
/// the same name.
pub struct LocalDocumentStore {
    root: PathBuf,
}

impl LocalDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    async fn save_document(&self, doc: &Document) -> Result<(), DomainError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| DomainError::internal(format!("creating upload dir: {e}")))?;

        let path = self.root.join(&doc.name);
        tokio::fs::write(&path, &doc.bytes)
            .await
            .map_err(|e| DomainError::internal(format!("writing {}: {e}", path.display())))?;

        tracing::debug!(path = %path.display(), size = doc.size(), "document saved");
        Ok(())
    }
}
