use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::{ports::ByteStore, DomainError};

/// Process-local byte store. Contents vanish with the process.
pub struct InMemoryByteStore {
    entries: RwLock<HashMap<String, HashMap<String, Vec<u8>>>>,
}

impl InMemoryByteStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self, namespace: &str) -> usize {
        self.entries
            .read()
            .map(|entries| entries.get(namespace).map_or(0, HashMap::len))
            .unwrap_or(0)
    }
}

impl Default for InMemoryByteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ByteStore for InMemoryByteStore {
    async fn mget(
        &self,
        namespace: &str,
        keys: &[String],
    ) -> Result<Vec<Option<Vec<u8>>>, DomainError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| DomainError::internal(e.to_string()))?;

        let bucket = entries.get(namespace);
        Ok(keys
            .iter()
            .map(|key| bucket.and_then(|b| b.get(key)).cloned())
            .collect())
    }

    async fn mset(
        &self,
        namespace: &str,
        entries: &[(String, Vec<u8>)],
    ) -> Result<(), DomainError> {
        let mut store = self
            .entries
            .write()
            .map_err(|e| DomainError::internal(e.to_string()))?;

        let bucket = store.entry(namespace.to_string()).or_default();
        for (key, value) in entries {
            bucket.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}
