//! Single-document question answering over retrieval-augmented generation.
//!
//! A session uploads one file, which is split into token-bounded chunks,
//! embedded through a durable cache and indexed in memory. Questions are
//! answered from the closest chunks with a streamed chat completion.

pub mod api;
pub mod application;
pub mod domain;
pub mod infrastructure;
