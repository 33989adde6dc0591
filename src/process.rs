//! Per-candidate processing: fetch, extract, compare, classify.
//!
//! Every failure mode of a single candidate collapses into its
//! [`MatchOutcome`] row; the only error that escapes is the
//! dimension-mismatch defect, which the pipeline treats as fatal.

use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::compare::compare;
use crate::error::MatchError;
use crate::extractor::DescriptorExtractor;
use crate::source::ImageSource;
use crate::types::{Candidate, Embedding, MatchOutcome};

/// Run one candidate through fetch → extract → compare.
///
/// `extract_lock` is `Some` when the pipeline serializes extraction for a
/// non-reentrant backend. `timeout` caps fetch + extraction together; the
/// comparison itself never suspends and runs outside the cap.
pub(crate) async fn process_candidate(
    candidate: &Candidate,
    reference: &Embedding,
    extractor: &dyn DescriptorExtractor,
    source: &dyn ImageSource,
    threshold: f32,
    timeout: Option<Duration>,
    extract_lock: Option<&Mutex<()>>,
) -> Result<MatchOutcome, MatchError> {
    let staged = fetch_and_extract(candidate, extractor, source, extract_lock);
    let extraction = match timeout {
        Some(limit) => match tokio::time::timeout(limit, staged).await {
            Ok(result) => result,
            Err(_) => Err(format!("timed out after {}ms", limit.as_millis())),
        },
        None => staged.await,
    };

    match extraction {
        Err(reason) => {
            warn!(candidate = %candidate.id, %reason, "candidate could not be processed");
            Ok(MatchOutcome::LoadFailed { reason })
        }
        Ok(None) => {
            debug!(candidate = %candidate.id, "no face detected");
            Ok(MatchOutcome::NoFaceDetected)
        }
        Ok(Some(descriptor)) => {
            let comparison = compare(reference, &descriptor, threshold)?;
            debug!(
                candidate = %candidate.id,
                distance = comparison.distance,
                is_match = comparison.is_match,
                "candidate compared"
            );
            Ok(if comparison.is_match {
                MatchOutcome::Matched {
                    distance: comparison.distance,
                }
            } else {
                MatchOutcome::NotMatched {
                    distance: comparison.distance,
                }
            })
        }
    }
}

/// Fetch bytes and extract the descriptor, rendering any failure into the
/// reason string of a `LoadFailed` outcome.
async fn fetch_and_extract(
    candidate: &Candidate,
    extractor: &dyn DescriptorExtractor,
    source: &dyn ImageSource,
    extract_lock: Option<&Mutex<()>>,
) -> Result<Option<Embedding>, String> {
    let bytes = source
        .load(&candidate.locator)
        .await
        .map_err(|err| err.to_string())?;
    trace!(candidate = %candidate.id, bytes = bytes.len(), "image fetched");

    let extraction = match extract_lock {
        Some(lock) => {
            let _guard = lock.lock().await;
            extractor.extract(&bytes).await
        }
        None => extractor.extract(&bytes).await,
    };
    extraction.map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::error::{ExtractError, SourceError};
    use crate::source::MemorySource;

    /// Extractor that maps the first input byte to a canned response.
    struct ByteKeyedExtractor;

    #[async_trait]
    impl DescriptorExtractor for ByteKeyedExtractor {
        async fn load_models(&self) -> Result<(), ExtractError> {
            Ok(())
        }

        async fn extract(&self, bytes: &[u8]) -> Result<Option<Embedding>, ExtractError> {
            match bytes.first() {
                Some(1) => Ok(Some(Embedding::new(vec![1.0, 0.0]))),
                Some(2) => Ok(Some(Embedding::new(vec![0.0, 1.0]))),
                Some(9) => Err(ExtractError::Backend("inference failed".into())),
                _ => Ok(None),
            }
        }
    }

    /// Source that stalls forever, for timeout coverage.
    struct StalledSource;

    #[async_trait]
    impl ImageSource for StalledSource {
        async fn load(&self, _locator: &str) -> Result<bytes::Bytes, SourceError> {
            std::future::pending().await
        }
    }

    fn reference() -> Embedding {
        Embedding::new(vec![1.0, 0.0])
    }

    #[tokio::test]
    async fn close_descriptor_is_matched() {
        let source = MemorySource::new().with_image("c.png", vec![1u8]);
        let candidate = Candidate::new("c", "c.png");

        let outcome = process_candidate(
            &candidate,
            &reference(),
            &ByteKeyedExtractor,
            &source,
            0.5,
            None,
            None,
        )
        .await
        .expect("no defect");
        assert!(matches!(outcome, MatchOutcome::Matched { distance } if distance == 0.0));
    }

    #[tokio::test]
    async fn distant_descriptor_is_not_matched() {
        let source = MemorySource::new().with_image("c.png", vec![2u8]);
        let candidate = Candidate::new("c", "c.png");

        let outcome = process_candidate(
            &candidate,
            &reference(),
            &ByteKeyedExtractor,
            &source,
            0.5,
            None,
            None,
        )
        .await
        .expect("no defect");
        // Orthogonal unit vectors sit at distance sqrt(2).
        assert!(matches!(outcome, MatchOutcome::NotMatched { distance } if distance > 1.0));
    }

    #[tokio::test]
    async fn missing_image_is_load_failed() {
        let source = MemorySource::new();
        let candidate = Candidate::new("c", "gone.png");

        let outcome = process_candidate(
            &candidate,
            &reference(),
            &ByteKeyedExtractor,
            &source,
            0.5,
            None,
            None,
        )
        .await
        .expect("no defect");
        assert!(matches!(outcome, MatchOutcome::LoadFailed { reason } if reason.contains("gone.png")));
    }

    #[tokio::test]
    async fn faceless_image_is_no_face_detected() {
        let source = MemorySource::new().with_image("c.png", vec![0u8]);
        let candidate = Candidate::new("c", "c.png");

        let outcome = process_candidate(
            &candidate,
            &reference(),
            &ByteKeyedExtractor,
            &source,
            0.5,
            None,
            None,
        )
        .await
        .expect("no defect");
        assert!(matches!(outcome, MatchOutcome::NoFaceDetected));
    }

    #[tokio::test]
    async fn extractor_failure_is_load_failed() {
        let source = MemorySource::new().with_image("c.png", vec![9u8]);
        let candidate = Candidate::new("c", "c.png");

        let outcome = process_candidate(
            &candidate,
            &reference(),
            &ByteKeyedExtractor,
            &source,
            0.5,
            None,
            None,
        )
        .await
        .expect("no defect");
        assert!(
            matches!(outcome, MatchOutcome::LoadFailed { reason } if reason.contains("inference failed"))
        );
    }

    #[tokio::test]
    async fn stalled_fetch_times_out_as_load_failed() {
        let candidate = Candidate::new("c", "slow.png");

        let outcome = process_candidate(
            &candidate,
            &reference(),
            &ByteKeyedExtractor,
            &StalledSource,
            0.5,
            Some(Duration::from_millis(20)),
            None,
        )
        .await
        .expect("no defect");
        assert!(matches!(outcome, MatchOutcome::LoadFailed { reason } if reason.contains("timed out")));
    }

    #[tokio::test]
    async fn wrong_dimension_descriptor_is_a_defect() {
        let source = MemorySource::new().with_image("c.png", vec![1u8]);
        let candidate = Candidate::new("c", "c.png");
        let three_dim_reference = Embedding::new(vec![1.0, 0.0, 0.0]);

        let err = process_candidate(
            &candidate,
            &three_dim_reference,
            &ByteKeyedExtractor,
            &source,
            0.5,
            None,
            None,
        )
        .await
        .expect_err("dimensions differ");
        assert!(matches!(err, MatchError::DimensionMismatch { .. }));
    }
}
