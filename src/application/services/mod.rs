mod answer;
mod cached_embeddings;
mod document;
mod rag;
mod session;

pub use answer::{
    AnswerAccumulator, AnswerGenerator, PromptTemplate, TokenSink, DEFAULT_SYSTEM_PROMPT,
};
pub use cached_embeddings::CachedEmbeddings;
pub use document::DocumentService;
pub use rag::{RagService, DEFAULT_INDEX_MEMO_CAPACITY};
pub use session::{ChatSession, QaPipeline, SessionStatus, MISSING_KEY_WARNING, READY_MESSAGE};
