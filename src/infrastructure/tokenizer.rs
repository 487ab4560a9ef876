use tiktoken_rs::CoreBPE;

use crate::domain::{ports::TokenCounter, DomainError};

/// Counts tokens with one of OpenAI's BPE encodings.
pub struct TiktokenCounter {
    encoding: String,
    bpe: CoreBPE,
}

impl TiktokenCounter {
    pub fn new(encoding: &str) -> Result<Self, DomainError> {
        let bpe = match encoding {
            "r50k_base" | "gpt2" => tiktoken_rs::r50k_base(),
            "p50k_base" => tiktoken_rs::p50k_base(),
            "cl100k_base" => tiktoken_rs::cl100k_base(),
            "o200k_base" => tiktoken_rs::o200k_base(),
            other => {
                return Err(DomainError::validation(format!(
                    "unknown tokenizer encoding '{other}'"
                )))
            }
        }
        .map_err(|e| DomainError::internal(format!("loading {encoding}: {e}")))?;

        Ok(Self {
            encoding: encoding.to_string(),
            bpe,
        })
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}
