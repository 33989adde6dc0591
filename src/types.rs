//! Core data types shared across the matching pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Fixed-length face descriptor produced by a
/// [`DescriptorExtractor`](crate::extractor::DescriptorExtractor).
///
/// The dimensionality is fixed by the extractor that produced the vector
/// (128 for the bundled backend). Embeddings are immutable once produced and
/// cheap to clone relative to the image they were derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding(Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Embedding(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl From<Vec<f32>> for Embedding {
    fn from(values: Vec<f32>) -> Self {
        Embedding::new(values)
    }
}

impl AsRef<[f32]> for Embedding {
    fn as_ref(&self) -> &[f32] {
        self.as_slice()
    }
}

/// One photo from the candidate set being tested against the reference.
///
/// `id` must be unique within a batch; `locator` is opaque to the pipeline
/// and only interpreted by the [`ImageSource`](crate::source::ImageSource)
/// that resolves it (a path, a URL, a map key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub locator: String,
}

impl Candidate {
    pub fn new(id: impl Into<String>, locator: impl Into<String>) -> Self {
        Candidate {
            id: id.into(),
            locator: locator.into(),
        }
    }
}

/// Classification of a single candidate after fetch, extraction, and
/// comparison. Exactly one outcome exists per input candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchOutcome {
    /// A face was found and its descriptor lies within the threshold.
    Matched { distance: f32 },
    /// A face was found but its descriptor lies outside the threshold.
    NotMatched { distance: f32 },
    /// The image was processed successfully and contains no detectable face.
    /// A valid terminal classification, not a failure; no distance exists.
    NoFaceDetected,
    /// The image could not be fetched or processed; `reason` is the rendered
    /// source or extractor error.
    LoadFailed { reason: String },
}

impl MatchOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchOutcome::Matched { .. })
    }

    /// Distance to the reference, when one was computed.
    pub fn distance(&self) -> Option<f32> {
        match self {
            MatchOutcome::Matched { distance } | MatchOutcome::NotMatched { distance } => {
                Some(*distance)
            }
            MatchOutcome::NoFaceDetected | MatchOutcome::LoadFailed { .. } => None,
        }
    }
}

/// One row of a [`MatchReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateOutcome {
    pub candidate: Candidate,
    pub outcome: MatchOutcome,
}

/// Final result of one matching run.
///
/// `outcomes` holds one row per input candidate, in input order regardless of
/// completion order. Per-outcome detail is preserved so callers can render
/// "no matches found", "could not process your selfie", and "some photos
/// could not be checked" as distinct states instead of one boolean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    pub outcomes: Vec<CandidateOutcome>,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl MatchReport {
    pub(crate) fn new(outcomes: Vec<CandidateOutcome>, elapsed: Duration) -> Self {
        MatchReport { outcomes, elapsed }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Candidates whose outcome is [`MatchOutcome::Matched`], in input order.
    pub fn matched(&self) -> Vec<&Candidate> {
        self.outcomes
            .iter()
            .filter(|row| row.outcome.is_matched())
            .map(|row| &row.candidate)
            .collect()
    }

    pub fn matched_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|row| row.outcome.is_matched())
            .count()
    }

    pub fn no_face_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|row| matches!(row.outcome, MatchOutcome::NoFaceDetected))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|row| matches!(row.outcome, MatchOutcome::LoadFailed { .. }))
            .count()
    }

    /// Outcome for a candidate id, if the id was part of the run.
    pub fn outcome_for(&self, id: &str) -> Option<&MatchOutcome> {
        self.outcomes
            .iter()
            .find(|row| row.candidate.id == id)
            .map(|row| &row.outcome)
    }
}
