//! Knowledge store: ingested documents and their flattened chunk index
//!
//! Ingestion is two-phase. A raw [`Document`] is chunked and embedded into an
//! [`IndexedDocument`] without touching the store, then the finished result
//! is inserted in one step. Readers never see a document whose chunks exist
//! but whose vectors do not.

use crate::chunking::{Chunk, Chunker};
use crate::embedding::{self, EmbeddingProvider, VectorIndex};
use crate::error::{DocQaError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Metadata attached to a document at ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub id: Uuid,
    /// Where the text came from (usually the uploaded file path)
    pub source: String,
    pub added_at: DateTime<Utc>,
    /// Whether any page needed OCR
    pub ocr_used: bool,
    /// BLAKE3 hash of the content
    pub fingerprint: String,
}

/// Raw document text plus metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(content: impl Into<String>, source: impl Into<String>, ocr_used: bool) -> Self {
        let content = content.into();
        let fingerprint = blake3::hash(content.as_bytes()).to_hex().to_string();
        Self {
            metadata: DocumentMetadata {
                id: Uuid::new_v4(),
                source: source.into(),
                added_at: Utc::now(),
                ocr_used,
                fingerprint,
            },
            content,
        }
    }
}

/// A document with its derived chunks and one embedding per chunk
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub document: Document,
    pub chunks: Vec<Chunk>,
    pub embeddings: Vec<Vec<f32>>,
}

impl IndexedDocument {
    /// Chunk and embed `document`
    ///
    /// Returns `Ok(None)` when the content yields no chunks.
    pub fn build(
        document: Document,
        chunker: &Chunker,
        provider: &dyn EmbeddingProvider,
    ) -> Result<Option<Self>> {
        let chunks = chunker.chunk(&document.content);
        if chunks.is_empty() {
            return Ok(None);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = provider.embed_batch(&texts)?;
        Self::assemble(document, chunks, embeddings).map(Some)
    }

    /// Same as [`IndexedDocument::build`] with embedding run on the blocking pool
    pub async fn build_async(
        document: Document,
        chunker: &Chunker,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Option<Self>> {
        let chunks = chunker.chunk(&document.content);
        if chunks.is_empty() {
            return Ok(None);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = embedding::encode_many(provider, texts).await?;
        Self::assemble(document, chunks, embeddings).map(Some)
    }

    fn assemble(
        document: Document,
        chunks: Vec<Chunk>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self> {
        if chunks.len() != embeddings.len() {
            return Err(DocQaError::Ingestion(format!(
                "Embedding count {} does not match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }
        Ok(Self {
            document,
            chunks,
            embeddings,
        })
    }
}

/// One retrieved chunk with its score
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub text: String,
    pub score: f32,
    pub document_id: Uuid,
    pub chunk_index: usize,
}

#[derive(Debug, Clone)]
struct FlatChunk {
    document_id: Uuid,
    chunk_index: usize,
    text: String,
}

/// In-memory store for one session
///
/// `chunks[i]` and row `i` of the vector index always describe the same chunk.
#[derive(Debug, Clone)]
pub struct KnowledgeStore {
    documents: Vec<IndexedDocument>,
    chunks: Vec<FlatChunk>,
    index: VectorIndex,
}

impl KnowledgeStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            documents: Vec::new(),
            chunks: Vec::new(),
            index: VectorIndex::new(dimension),
        }
    }

    /// Chunk, embed and insert a document
    ///
    /// Returns `Ok(false)` without changing the store when no chunks come out.
    /// Re-adding the same document duplicates its chunks.
    pub fn add(
        &mut self,
        document: Document,
        chunker: &Chunker,
        provider: &dyn EmbeddingProvider,
    ) -> Result<bool> {
        match IndexedDocument::build(document, chunker, provider)? {
            Some(indexed) => {
                self.insert(indexed)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Append an already indexed document
    pub fn insert(&mut self, indexed: IndexedDocument) -> Result<()> {
        self.index.insert_batch(&indexed.embeddings)?;

        let document_id = indexed.document.metadata.id;
        self.chunks
            .extend(indexed.chunks.iter().map(|chunk| FlatChunk {
                document_id,
                chunk_index: chunk.index,
                text: chunk.text.clone(),
            }));

        tracing::debug!(
            document = %document_id,
            chunks = indexed.chunks.len(),
            total_chunks = self.chunks.len(),
            "Inserted document into knowledge store"
        );

        self.documents.push(indexed);
        Ok(())
    }

    /// Top-`k` chunks by descending cosine similarity to `query_embedding`
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        if self.chunks.is_empty() {
            return Ok(Vec::new());
        }

        let results = self.index.search(query_embedding, k)?;
        Ok(results
            .into_iter()
            .map(|hit| {
                let chunk = &self.chunks[hit.index];
                RetrievedChunk {
                    text: chunk.text.clone(),
                    score: hit.score,
                    document_id: chunk.document_id,
                    chunk_index: chunk.chunk_index,
                }
            })
            .collect())
    }

    /// Embed `query` and return the texts of the top-`k` chunks
    ///
    /// The provider is not consulted when the store is empty.
    pub fn search_text(
        &self,
        provider: &dyn EmbeddingProvider,
        query: &str,
        k: usize,
    ) -> Result<Vec<String>> {
        if self.chunks.is_empty() {
            return Ok(Vec::new());
        }
        let query_embedding = provider.embed(query)?;
        Ok(self
            .search(&query_embedding, k)?
            .into_iter()
            .map(|c| c.text)
            .collect())
    }

    /// Drop every document, chunk and vector
    pub fn reset(&mut self) {
        self.documents.clear();
        self.chunks.clear();
        self.index.clear();
    }

    pub fn documents(&self) -> &[IndexedDocument] {
        &self.documents
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }
}
