//! Boundary-aware text chunking
//!
//! Splits document text into overlapping windows of `chunk_size` characters
//! advancing by `chunk_size - overlap`. A window that stops short of the end
//! of the text is pulled back to just after the last period or newline inside
//! it, so chunks tend to end on sentence boundaries.

use crate::config::ChunkingConfig;
use crate::error::{DocQaError, Result};
use serde::{Deserialize, Serialize};

/// A trimmed slice of a document's text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of this chunk within its document
    pub index: usize,
    /// Chunk text with surrounding whitespace removed
    pub text: String,
    /// Start offset (in characters) into the text passed to [`Chunker::chunk`]
    pub start: usize,
    /// End offset (exclusive, in characters)
    pub end: usize,
}

/// Sliding-window chunker
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    /// Create a chunker, rejecting parameters that would never advance the window
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 || overlap >= chunk_size {
            return Err(DocQaError::InvalidConfiguration {
                chunk_size,
                overlap,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance between consecutive window starts (always > 0)
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }

    /// Split `text` into ordered, non-empty chunks
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();

        let lead = chars.iter().take_while(|c| c.is_whitespace()).count();
        if lead == chars.len() {
            return Vec::new();
        }
        let trail = chars.iter().rev().take_while(|c| c.is_whitespace()).count();
        let body = &chars[lead..chars.len() - trail];
        let len = body.len();

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < len {
            let raw_end = start + self.chunk_size;
            let end = if raw_end > len {
                len
            } else {
                match last_break(body, start, raw_end) {
                    Some(pos) if pos > start => pos + 1,
                    _ => raw_end,
                }
            };

            let window = &body[start..end];
            let leading = window.iter().take_while(|c| c.is_whitespace()).count();
            if leading < window.len() {
                let trailing = window.iter().rev().take_while(|c| c.is_whitespace()).count();
                let chunk_start = start + leading;
                let chunk_end = end - trailing;
                chunks.push(Chunk {
                    index: chunks.len(),
                    text: body[chunk_start..chunk_end].iter().collect(),
                    start: lead + chunk_start,
                    end: lead + chunk_end,
                });
            }

            // Advance from the raw window start, not the trimmed or refined one
            start += self.step();
        }

        chunks
    }

    /// Convenience wrapper returning only the chunk texts
    pub fn chunk_texts(&self, text: &str) -> Vec<String> {
        self.chunk(text).into_iter().map(|c| c.text).collect()
    }
}

/// Last '.' or '\n' in `body[start..end]`
fn last_break(body: &[char], start: usize, end: usize) -> Option<usize> {
    body[start..end]
        .iter()
        .rposition(|&c| c == '.' || c == '\n')
        .map(|offset| start + offset)
}
