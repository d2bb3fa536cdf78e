//! Retrieval routing
//!
//! Every question passes the security gate first. Unblocked questions are
//! answered from the session's knowledge store, falling back to web search
//! when the store returns nothing, and the assembled prompt goes to the
//! session's language model.

mod prompt;
mod router;

pub use prompt::{build_prompt, estimate_tokens, local_context, web_context, NO_RESULTS_MARKER};
pub use router::Router;

use serde::{Deserialize, Serialize};

/// How a question was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Matched a security rule; canned response, no retrieval
    Blocked,
    /// Nothing ingested yet; upload prompt, no web search
    EmptyKnowledgeBase,
    /// Answered with chunks from the knowledge store
    LocalHit,
    /// Local search was empty; context came from the web (possibly nothing)
    WebFallback,
    /// Session was reset before the prompt went out
    Cancelled,
}

/// Result of one question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    /// Approximate token cost, see [`estimate_tokens`]
    pub tokens: u64,
    pub route: Route,
    /// Whether the exchange was written to the conversation
    pub recorded: bool,
}

/// Result of one upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestOutcome {
    pub success: bool,
    pub message: String,
    /// Chunks added to the knowledge store
    pub chunks: usize,
}

impl IngestOutcome {
    fn added(chunks: usize, ocr_used: bool) -> Self {
        let ocr = if ocr_used { " (OCR was used)" } else { "" };
        Self {
            success: true,
            message: format!("Document processed successfully{}!", ocr),
            chunks,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            chunks: 0,
        }
    }
}
