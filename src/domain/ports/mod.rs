mod byte_store;
mod document_store;
mod embedding;
mod llm;
mod providers;
mod tokenizer;

pub use byte_store::ByteStore;
pub use document_store::DocumentStore;
pub use embedding::EmbeddingService;
pub use llm::{ChatModel, PromptMessage, PromptRole, TokenStream};
pub use providers::ProviderFactory;
pub use tokenizer::TokenCounter;
