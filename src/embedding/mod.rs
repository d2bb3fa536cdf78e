//! Embedding & similarity search
//!
//! - `EmbeddingProvider` trait for abstraction over embedding backends
//! - `FastEmbedProvider` for local model embeddings (all-MiniLM-L6-v2, 384-dim)
//! - `HashingEmbedder` for deterministic offline embeddings
//! - `VectorIndex` for exact top-k cosine search
mod provider;
mod vector_index;

pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider, HashingEmbedder};
pub use vector_index::{SearchResult, VectorIndex, VectorIndexError};

use crate::config::EmbeddingConfig;
use std::sync::Arc;

/// Cosine similarity `dot(a, b) / (|a| * |b|)`
///
/// Similarity against a zero vector is 0 so that ranking stays total.
pub fn similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Build the provider named in the configuration
pub fn build_provider(
    config: &EmbeddingConfig,
) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    match config.provider.as_str() {
        "fastembed" => Ok(Arc::new(FastEmbedProvider::new(
            &config.model,
            config.batch_size,
        )?)),
        "hashing" => Ok(Arc::new(HashingEmbedder::new(config.dimension))),
        other => Err(EmbeddingError::InitializationError(format!(
            "Unknown embedding provider: {}",
            other
        ))),
    }
}

/// Embed `texts` on the blocking pool; model inference is CPU bound
pub async fn encode_many(
    provider: Arc<dyn EmbeddingProvider>,
    texts: Vec<String>,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    tokio::task::spawn_blocking(move || provider.embed_batch(&texts))
        .await
        .map_err(|e| EmbeddingError::GenerationError(format!("Embedding task failed: {}", e)))?
}

/// Embed a single text on the blocking pool
pub async fn encode(
    provider: Arc<dyn EmbeddingProvider>,
    text: String,
) -> Result<Vec<f32>, EmbeddingError> {
    tokio::task::spawn_blocking(move || provider.embed(&text))
        .await
        .map_err(|e| EmbeddingError::GenerationError(format!("Embedding task failed: {}", e)))?
}
