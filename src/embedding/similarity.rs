//! Cosine similarity and relevance scoring

use super::Embedding;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimilarityError {
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Cosine similarity of two vectors, in [-1, 1].
///
/// A zero-norm argument yields 0. Vectors of different length are an error.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, SimilarityError> {
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());
    Ok(similarity.clamp(-1.0, 1.0) as f32)
}

/// Map a cosine similarity onto a [0, 1] relevance score
pub fn relevance_score(similarity: f32) -> f32 {
    ((similarity + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// Compare two embeddings, rejecting mismatched dimensions up front
pub fn compare(a: &Embedding, b: &Embedding) -> Result<f32, SimilarityError> {
    if a.dimensions() != b.dimensions() {
        return Err(SimilarityError::DimensionMismatch {
            expected: a.dimensions(),
            actual: b.dimensions(),
        });
    }
    cosine_similarity(a.vector(), b.vector())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_self_similarity() {
        let vectors = [
            vec![1.0, 0.0, 0.0],
            vec![0.3, -0.7, 2.5, 0.01],
            vec![1e-3, 4e-3, 9e-3],
            vec![-5.0; 384],
        ];
        for v in &vectors {
            assert!(approx(cosine_similarity(v, v).unwrap(), 1.0));
        }
    }

    #[test]
    fn test_symmetry() {
        let a = vec![0.2, 0.9, -0.4, 1.3];
        let b = vec![-1.1, 0.5, 0.7, 0.05];
        assert_eq!(
            cosine_similarity(&a, &b).unwrap(),
            cosine_similarity(&b, &a).unwrap()
        );
    }

    #[test]
    fn test_orthogonal_and_opposite() {
        assert!(approx(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap(), 0.0));
        assert!(approx(cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]).unwrap(), -1.0));
    }

    #[test]
    fn test_zero_vector() {
        let zero = vec![0.0; 3];
        let v = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&zero, &v).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&v, &zero).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero).unwrap(), 0.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let result = cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]);
        assert_eq!(
            result,
            Err(SimilarityError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        );
    }

    #[test]
    fn test_relevance_score() {
        assert_eq!(relevance_score(1.0), 1.0);
        assert_eq!(relevance_score(0.0), 0.5);
        assert_eq!(relevance_score(-1.0), 0.0);
        assert_eq!(relevance_score(-3.0), 0.0);
        assert_eq!(relevance_score(2.0), 1.0);
    }

    #[test]
    fn test_compare_embeddings() {
        let a = Embedding::new(vec![1.0, 0.0], "m");
        let b = Embedding::new(vec![1.0, 0.0, 0.0], "m");
        assert!(compare(&a, &b).is_err());
        assert!(approx(compare(&a, &a).unwrap(), 1.0));
    }
}
