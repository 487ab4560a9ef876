use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::DomainError;

/// Provider API key. Lives in process memory only.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into().trim().to_string())
    }

    pub fn is_configured(&self) -> bool {
        !self.0.is_empty()
    }

    /// Returns the key, or an auth error when none has been entered.
    pub fn require(&self) -> Result<&str, DomainError> {
        if self.is_configured() {
            Ok(&self.0)
        } else {
            Err(DomainError::auth("API key is not configured"))
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_configured() {
            f.write_str("Credential(***)")
        } else {
            f.write_str("Credential(<unset>)")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NoDocument,
    DocumentLoading,
    DocumentReady,
    Answering,
}
