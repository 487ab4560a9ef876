pub mod cache;
pub mod config;
pub mod embedding;
pub mod http;
pub mod llm;
pub mod providers;
pub mod storage;
pub mod tokenizer;

pub use cache::{InMemoryByteStore, LocalFileStore, RedisByteStore, RedisPool};
pub use config::{AppConfig, CacheBackend, Config, LogFormat, PromptsConfig};
pub use embedding::OpenAiEmbeddings;
pub use llm::OpenAiChat;
pub use providers::OpenAiProviders;
pub use storage::LocalDocumentStore;
pub use tokenizer::TiktokenCounter;
