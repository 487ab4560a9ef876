mod conversation;
mod document;
mod embedding;
mod session;

pub use conversation::{ChatHistory, ChatTurn, Role};
pub use document::{format_context, Document, DocumentChunk, DocumentFormat, SearchResult};
pub use embedding::Embedding;
pub use session::{Credential, SessionState};
