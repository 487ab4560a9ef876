use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use uuid::Uuid;

use crate::domain::errors::DomainError;

/// File formats accepted by the upload surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    PlainText,
    Pdf,
    Docx,
    SlideDeck,
}

impl DocumentFormat {
    pub const ALLOWED_EXTENSIONS: [&'static str; 4] = ["txt", "pdf", "docx", "pptx"];

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" => Some(Self::PlainText),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "pptx" => Some(Self::SlideDeck),
            _ => None,
        }
    }

    pub fn from_filename(filename: &str) -> Result<Self, DomainError> {
        Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
            .ok_or_else(|| {
                DomainError::load(format!(
                    "unsupported file type '{}', expected one of: {}",
                    filename,
                    Self::ALLOWED_EXTENSIONS.join(", ")
                ))
            })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlainText => "txt",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::SlideDeck => "pptx",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    pub format: DocumentFormat,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub content_hash: String,
    pub uploaded_at: DateTime<Utc>,
}

impl Document {
    /// Builds a document from an upload. The filename doubles as the cache
    /// namespace, so it must be a single plain path component.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, DomainError> {
        let name = name.into();
        validate_filename(&name)?;
        let format = DocumentFormat::from_filename(&name)?;
        let content_hash = hex::encode(Sha256::digest(&bytes));

        Ok(Self {
            id: Uuid::new_v4(),
            name,
            format,
            bytes,
            content_hash,
            uploaded_at: Utc::now(),
        })
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

fn validate_filename(name: &str) -> Result<(), DomainError> {
    let is_plain = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
        && !name.starts_with('.');

    if is_plain {
        Ok(())
    } else {
        Err(DomainError::load(format!("invalid file name '{name}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub document_id: Uuid,
    pub content: String,
    pub chunk_index: usize,
}

impl DocumentChunk {
    pub fn new(document_id: Uuid, content: impl Into<String>, chunk_index: usize) -> Self {
        Self {
            document_id,
            content: content.into(),
            chunk_index,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub chunk: DocumentChunk,
    pub score: f32,
}

/// Joins retrieved chunks into the context block handed to the model.
pub fn format_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| r.chunk.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
