//! In-memory vector index over the memory collection.
//!
//! Vectors are stored in record order, so a vector's position in the
//! index is the record it belongs to. Search is an exact linear scan:
//! inner product against every stored vector, which equals cosine
//! similarity because all vectors are unit-normalized.

/// A search hit: the record's position in the collection plus its score.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub index: usize,
    pub score: f32,
}

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Cannot store or search with zero-norm vector")]
    ZeroNormVector,
}

/// Exact inner-product index, built once from the full collection.
pub struct MemoryIndex {
    vectors: Vec<Vec<f32>>,
    dimensions: usize,
}

impl MemoryIndex {
    /// Create a new empty index with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self {
            vectors: Vec::new(),
            dimensions,
        }
    }

    /// Build an index from vectors already in record order.
    pub fn build(dimensions: usize, vectors: Vec<Vec<f32>>) -> Result<Self, IndexError> {
        let mut index = Self::new(dimensions);
        for vector in vectors {
            index.push(vector)?;
        }
        Ok(index)
    }

    /// Append the next record's vector.
    ///
    /// Returns an error on dimension mismatch or zero norm.
    pub fn push(&mut self, embedding: Vec<f32>) -> Result<(), IndexError> {
        if embedding.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: embedding.len(),
            });
        }

        let norm = l2_norm(&embedding);
        if norm < f32::EPSILON {
            return Err(IndexError::ZeroNormVector);
        }

        self.vectors.push(embedding);
        Ok(())
    }

    /// Get the expected embedding dimensions.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Get the number of indexed vectors.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Vector for the record at `index`.
    pub fn get(&self, index: usize) -> Option<&[f32]> {
        self.vectors.get(index).map(|v| v.as_slice())
    }

    /// Iterate over stored vectors in record order.
    pub fn iter(&self) -> impl Iterator<Item = &[f32]> {
        self.vectors.iter().map(|v| v.as_slice())
    }

    /// Search for the `k` nearest vectors by inner product.
    ///
    /// `k` is clamped to the number of stored vectors; asking for more
    /// than available returns everything ranked. Results are ordered by
    /// descending score, ties broken by ascending record index so the
    /// ordering is deterministic.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Candidate>, IndexError> {
        if query.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                got: query.len(),
            });
        }

        if l2_norm(query) < f32::EPSILON {
            return Err(IndexError::ZeroNormVector);
        }

        let k = k.min(self.vectors.len());

        let mut results: Vec<Candidate> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(index, vector)| Candidate {
                index,
                score: dot(query, vector),
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.index.cmp(&b.index))
        });

        results.truncate(k);

        Ok(results)
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_record_index() -> MemoryIndex {
        MemoryIndex::build(
            3,
            vec![
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.6, 0.8, 0.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_new_index() {
        let index = MemoryIndex::new(384);
        assert_eq!(index.dimensions(), 384);
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn test_push_dimension_mismatch() {
        let mut index = MemoryIndex::new(3);
        let wrong_dims = vec![1.0, 0.0, 0.0, 0.0]; // 4 dims

        let result = index.push(wrong_dims);
        assert!(matches!(result, Err(IndexError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_push_zero_norm_rejected() {
        let mut index = MemoryIndex::new(3);
        let zero_vec = vec![0.0, 0.0, 0.0];

        let result = index.push(zero_vec);
        assert!(matches!(result, Err(IndexError::ZeroNormVector)));
    }

    #[test]
    fn test_rank_correctness() {
        let index = three_record_index();

        // Inner products: record 0 -> 0.8, record 1 -> 0.6, record 2 -> 0.96
        let query = vec![0.8, 0.6, 0.0];
        let results = index.search(&query, 3).unwrap();

        let order: Vec<usize> = results.iter().map(|c| c.index).collect();
        assert_eq!(order, vec![2, 0, 1]);

        assert!((results[0].score - 0.96).abs() < 1e-6);
        assert!((results[1].score - 0.8).abs() < 1e-6);
        assert!((results[2].score - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_search_is_deterministic() {
        let index = three_record_index();
        let query = vec![0.8, 0.6, 0.0];

        let first = index.search(&query, 3).unwrap();
        let second = index.search(&query, 3).unwrap();

        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.index, b.index);
            assert_eq!(a.score, b.score);
        }
    }

    #[test]
    fn test_k_clamped_to_available() {
        let index = three_record_index();
        let query = vec![1.0, 0.0, 0.0];

        let results = index.search(&query, 100).unwrap();
        assert_eq!(results.len(), 3);

        let results = index.search(&query, 0).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_equal_scores_tie_break_by_index() {
        let index = MemoryIndex::build(
            3,
            vec![
                vec![0.0, 1.0, 0.0],
                vec![1.0, 0.0, 0.0],
                vec![1.0, 0.0, 0.0],
            ],
        )
        .unwrap();

        let query = vec![1.0, 0.0, 0.0];
        let results = index.search(&query, 3).unwrap();

        let order: Vec<usize> = results.iter().map(|c| c.index).collect();
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_search_empty_index() {
        let index = MemoryIndex::new(3);
        let results = index.search(&[1.0, 0.0, 0.0], 10).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_search_dimension_mismatch() {
        let index = three_record_index();
        let result = index.search(&[1.0, 0.0], 3);
        assert!(matches!(result, Err(IndexError::DimensionMismatch { .. })));
    }

    #[test]
    fn test_search_zero_norm_query() {
        let index = three_record_index();
        let result = index.search(&[0.0, 0.0, 0.0], 3);
        assert!(matches!(result, Err(IndexError::ZeroNormVector)));
    }
}
