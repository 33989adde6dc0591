//! Pure distance computation and the threshold decision.
//!
//! Nothing here suspends or allocates; the comparator is safe to call from
//! any number of concurrent workers without synchronization.

use crate::error::MatchError;
use crate::types::Embedding;

/// Result of comparing one candidate descriptor against the reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    pub distance: f32,
    pub is_match: bool,
}

/// Euclidean (L2) distance between two embeddings.
///
/// Errs with [`MatchError::DimensionMismatch`] when the lengths differ; with
/// a single extractor feeding both sides of a run this never happens.
pub fn euclidean_distance(a: &Embedding, b: &Embedding) -> Result<f32, MatchError> {
    if a.len() != b.len() {
        return Err(MatchError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    let sum: f32 = a
        .as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(x, y)| (x - y).powi(2))
        .sum();
    Ok(sum.sqrt())
}

/// Threshold test: a candidate matches when its distance to the reference is
/// strictly below `threshold`.
pub fn compare(a: &Embedding, b: &Embedding, threshold: f32) -> Result<Comparison, MatchError> {
    let distance = euclidean_distance(a, b)?;
    Ok(Comparison {
        distance,
        is_match: distance < threshold,
    })
}
