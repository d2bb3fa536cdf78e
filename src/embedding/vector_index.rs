/// Exact cosine-similarity index over a dense row matrix
use ndarray::{Array1, Array2, ArrayView1, Axis};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Insert failed: {0}")]
    InsertError(String),
}

/// Search result with row index and similarity score
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Row of the matching vector (insertion order)
    pub index: usize,
    /// Cosine similarity in [-1, 1]; 0 against a zero vector
    pub score: f32,
}

/// Brute-force vector index
///
/// Rows are kept in insertion order so that row `i` always belongs to the
/// `i`-th chunk of the owning store. Every search scores every row, which
/// keeps ranking exact and tie order reproducible.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    matrix: Array2<f32>,
    dimension: usize,
}

impl VectorIndex {
    /// Create an empty index for vectors of `dimension` components
    pub fn new(dimension: usize) -> Self {
        Self {
            matrix: Array2::zeros((0, dimension)),
            dimension,
        }
    }

    /// Append vectors as new rows
    ///
    /// All vectors are checked before any row is written, so a failed call
    /// leaves the index unchanged.
    pub fn insert_batch(&mut self, vectors: &[Vec<f32>]) -> Result<(), VectorIndexError> {
        for vector in vectors {
            if vector.len() != self.dimension {
                return Err(VectorIndexError::InvalidDimension {
                    expected: self.dimension,
                    actual: vector.len(),
                });
            }
        }

        for vector in vectors {
            self.matrix
                .push_row(ArrayView1::from(vector.as_slice()))
                .map_err(|e| VectorIndexError::InsertError(e.to_string()))?;
        }

        Ok(())
    }

    /// Return up to `k` rows ranked by descending cosine similarity to `query`
    ///
    /// Equal scores keep insertion order. An empty index yields no results.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>, VectorIndexError> {
        if query.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query = Array1::from(query.to_vec());
        let query_norm = query.dot(&query).sqrt();
        let dots = self.matrix.dot(&query);
        let row_norms = self.matrix.map_axis(Axis(1), |row| row.dot(&row).sqrt());

        let mut results: Vec<SearchResult> = dots
            .iter()
            .zip(row_norms.iter())
            .enumerate()
            .map(|(index, (dot, norm))| {
                let denom = norm * query_norm;
                let score = if denom == 0.0 { 0.0 } else { dot / denom };
                SearchResult { index, score }
            })
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.index.cmp(&b.index)));
        results.truncate(k);

        Ok(results)
    }

    /// Get the number of vectors in the index
    pub fn len(&self) -> usize {
        self.matrix.nrows()
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get vector dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Remove all vectors
    pub fn clear(&mut self) {
        self.matrix = Array2::zeros((0, self.dimension));
    }
}
