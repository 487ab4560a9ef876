//! Application layer - Use cases and orchestration.
//!
//! Services here depend on domain ports (traits) rather than concrete
//! implementations. `ChatSession` ties them together for one user.

pub mod services;

#[cfg(test)]
pub(crate) mod testing;

pub use services::{
    AnswerGenerator, CachedEmbeddings, ChatSession, DocumentService, PromptTemplate, QaPipeline,
    RagService, SessionStatus, TokenSink,
};
