pub mod entities;
pub mod errors;
pub mod index;
pub mod loader;
pub mod ports;
pub mod splitter;

pub use entities::*;
pub use errors::{DomainError, Result};
pub use index::VectorIndex;
pub use loader::DocumentLoader;
pub use splitter::{SplitterConfig, TextSplitter};
