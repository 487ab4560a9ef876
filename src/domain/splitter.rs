use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{errors::DomainError, ports::TokenCounter, DocumentChunk};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitterConfig {
    pub separator: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            separator: "\n".to_string(),
            chunk_size: 600,
            chunk_overlap: 100,
        }
    }
}

impl SplitterConfig {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.chunk_size == 0 {
            return Err(DomainError::validation("chunk_size must be greater than 0"));
        }
        if self.chunk_overlap > self.chunk_size {
            return Err(DomainError::validation(format!(
                "chunk_overlap ({}) must not exceed chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.separator.is_empty() {
            return Err(DomainError::validation("separator must not be empty"));
        }
        Ok(())
    }
}

/// Separator-based splitter that budgets chunks in token units.
///
/// Text is cut on the separator, oversized pieces are cut further on
/// whitespace (then characters), and the pieces are merged greedily into
/// chunks of at most `chunk_size` units. Each new chunk starts with the
/// trailing pieces of the previous one, up to `chunk_overlap` units.
/// Output depends only on the input and the config.
pub struct TextSplitter {
    config: SplitterConfig,
    counter: Arc<dyn TokenCounter>,
}

impl TextSplitter {
    pub fn new(config: SplitterConfig, counter: Arc<dyn TokenCounter>) -> Result<Self, DomainError> {
        config.validate()?;
        Ok(Self { config, counter })
    }

    /// Splits every segment and numbers the resulting chunks in order.
    pub fn split_segments(&self, document_id: Uuid, segments: &[String]) -> Vec<DocumentChunk> {
        segments
            .iter()
            .flat_map(|segment| self.split_text(segment))
            .enumerate()
            .map(|(index, content)| DocumentChunk::new(document_id, content, index))
            .collect()
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        let pieces: Vec<(String, usize)> = text
            .split(self.config.separator.as_str())
            .filter(|piece| !piece.trim().is_empty())
            .flat_map(|piece| self.fit_piece(piece))
            .map(|piece| {
                let len = self.counter.count(&piece);
                (piece, len)
            })
            .collect::<Vec<_>>();

        self.merge(pieces)
    }

    fn merge(&self, pieces: Vec<(String, usize)>) -> Vec<String> {
        let sep_len = self.counter.count(&self.config.separator);
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut chunks = Vec::new();
        let mut current: Vec<(String, usize)> = Vec::new();

        for (piece, len) in pieces {
            if !current.is_empty() && joined_len(&current, sep_len) + sep_len + len > size {
                self.emit(&current, &mut chunks);

                while !current.is_empty() {
                    let total = joined_len(&current, sep_len);
                    if total > overlap || total + sep_len + len > size {
                        current.remove(0);
                    } else {
                        break;
                    }
                }
            }
            current.push((piece, len));
        }

        if !current.is_empty() {
            self.emit(&current, &mut chunks);
        }

        chunks
    }

    fn emit(&self, current: &[(String, usize)], chunks: &mut Vec<String>) {
        let text = current
            .iter()
            .map(|(piece, _)| piece.as_str())
            .collect::<Vec<_>>()
            .join(&self.config.separator);
        let text = text.trim();
        if !text.is_empty() {
            chunks.push(text.to_string());
        }
    }

    /// Breaks a piece that alone exceeds the budget.
    fn fit_piece(&self, piece: &str) -> Vec<String> {
        let size = self.config.chunk_size;
        if self.counter.count(piece) <= size {
            return vec![piece.to_string()];
        }

        let mut out = Vec::new();
        let mut current = String::new();
        for word in piece.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };

            if self.counter.count(&candidate) <= size {
                current = candidate;
                continue;
            }

            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            if self.counter.count(word) <= size {
                current = word.to_string();
            } else {
                out.extend(self.split_chars(word));
            }
        }
        if !current.is_empty() {
            out.push(current);
        }
        out
    }

    fn split_chars(&self, word: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut current = String::new();
        for ch in word.chars() {
            current.push(ch);
            if current.chars().count() > 1 && self.counter.count(&current) > self.config.chunk_size
            {
                current.pop();
                out.push(std::mem::take(&mut current));
                current.push(ch);
            }
        }
        if !current.is_empty() {
            out.push(current);
        }
        out
    }
}

fn joined_len(pieces: &[(String, usize)], sep_len: usize) -> usize {
    let sum: usize = pieces.iter().map(|(_, len)| len).sum();
    sum + sep_len * pieces.len().saturating_sub(1)
}
