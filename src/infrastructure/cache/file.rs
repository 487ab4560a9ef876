use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::domain::{ports::ByteStore, DomainError};

/// Byte store laid out as `<root>/<namespace>/<key>`, one file per entry.
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry_path(&self, namespace: &str, key: &str) -> Result<PathBuf, DomainError> {
        check_component(namespace)?;
        check_component(key)?;
        Ok(self.root.join(namespace).join(key))
    }
}

fn check_component(part: &str) -> Result<(), DomainError> {
    if part.is_empty()
        || part == "."
        || part == ".."
        || part.contains(['/', '\\', '\0'])
    {
        return Err(DomainError::internal(format!(
            "invalid cache path component '{part}'"
        )));
    }
    Ok(())
}

fn io_error(path: &Path, e: std::io::Error) -> DomainError {
    DomainError::internal(format!("cache I/O on {}: {e}", path.display()))
}

#[async_trait]
impl ByteStore for LocalFileStore {
    async fn mget(
        &self,
        namespace: &str,
        keys: &[String],
    ) -> Result<Vec<Option<Vec<u8>>>, DomainError> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let path = self.entry_path(namespace, key)?;
            match tokio::fs::read(&path).await {
                Ok(bytes) => values.push(Some(bytes)),
                Err(e) if e.kind() == ErrorKind::NotFound => values.push(None),
                Err(e) => return Err(io_error(&path, e)),
            }
        }
        Ok(values)
    }

    async fn mset(
        &self,
        namespace: &str,
        entries: &[(String, Vec<u8>)],
    ) -> Result<(), DomainError> {
        if entries.is_empty() {
            return Ok(());
        }
        check_component(namespace)?;
        let dir = self.root.join(namespace);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_error(&dir, e))?;

        for (key, value) in entries {
            let path = self.entry_path(namespace, key)?;
            // Readers only ever see complete entries.
            let staging = dir.join(format!(".{key}.{}", Uuid::new_v4()));
            tokio::fs::write(&staging, value)
                .await
                .map_err(|e| io_error(&staging, e))?;
            tokio::fs::rename(&staging, &path)
                .await
                .map_err(|e| io_error(&path, e))?;
        }

        tracing::debug!(namespace, count = entries.len(), "cache entries written");
        Ok(())
    }
}
