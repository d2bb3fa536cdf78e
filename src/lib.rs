//! docqa - Document Question Answering
//!
//! Uploaded documents are extracted (with OCR for scanned pages), split into
//! overlapping chunks and embedded into a per-session knowledge store.
//! Questions pass a security gate, are answered from the most similar chunks
//! (or web search results when the store has nothing), and go to a hosted
//! language model together with the session's conversation.

pub mod chunking;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod embedding;
pub mod error;
pub mod extraction;
pub mod knowledge;
pub mod llm;
pub mod retrieval;
pub mod security;
pub mod session;
pub mod websearch;

pub use error::{DocQaError, Result};
