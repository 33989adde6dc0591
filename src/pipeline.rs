//! Concurrent matching pipeline.
//!
//! [`MatchPipeline`] extracts the reference descriptor once, fans candidate
//! processing out over a bounded worker pool, and reassembles the completions
//! into input order. Per-candidate failures stay inside their report row; the
//! run itself only fails for reference-level problems, configuration defects,
//! or cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::config::MatchConfig;
use crate::error::MatchError;
use crate::extractor::DescriptorExtractor;
use crate::observer::MatchObserver;
use crate::process::process_candidate;
use crate::source::ImageSource;
use crate::types::{Candidate, CandidateOutcome, MatchReport};

/// Orchestrates one reference photo against an ordered candidate set.
///
/// The pipeline is reusable: `run` borrows it, so one configured instance can
/// serve many matching runs, sharing the extractor's loaded models.
pub struct MatchPipeline {
    extractor: Arc<dyn DescriptorExtractor>,
    source: Arc<dyn ImageSource>,
    config: MatchConfig,
    observer: Option<Arc<dyn MatchObserver>>,
    // Present when the extractor backend cannot run concurrent extractions.
    extract_lock: Option<Mutex<()>>,
}

impl MatchPipeline {
    /// Build a pipeline, rejecting invalid settings up front.
    pub fn new(
        extractor: Arc<dyn DescriptorExtractor>,
        source: Arc<dyn ImageSource>,
        config: MatchConfig,
    ) -> Result<Self, MatchError> {
        config.validate()?;
        let extract_lock = config.serialize_extraction.then(|| Mutex::new(()));
        Ok(MatchPipeline {
            extractor,
            source,
            config,
            observer: None,
            extract_lock,
        })
    }

    /// Attach a progress observer. Callbacks fire in completion order.
    pub fn with_observer(mut self, observer: Arc<dyn MatchObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Match every candidate against the reference photo.
    pub async fn run(
        &self,
        reference: &[u8],
        candidates: Vec<Candidate>,
    ) -> Result<MatchReport, MatchError> {
        self.run_with_cancel(reference, candidates, &CancelToken::new())
            .await
    }

    /// Like [`run`](Self::run), but abandons the run when `cancel` fires.
    ///
    /// Cancellation drops in-flight candidate work and discards partial
    /// results; the caller gets `Err(MatchError::Cancelled)`, never a
    /// truncated report.
    pub async fn run_with_cancel(
        &self,
        reference: &[u8],
        candidates: Vec<Candidate>,
        cancel: &CancelToken,
    ) -> Result<MatchReport, MatchError> {
        let started = Instant::now();
        if cancel.is_cancelled() {
            return Err(MatchError::Cancelled);
        }

        self.extractor
            .load_models()
            .await
            .map_err(|err| MatchError::ModelLoad(err.to_string()))?;

        // The reference is extracted exactly once, before any candidate work
        // or image source call happens.
        let reference = match self.extractor.extract(reference).await {
            Ok(Some(embedding)) => embedding,
            Ok(None) => return Err(MatchError::NoReferenceFace),
            Err(err) => {
                warn!(error = %err, "reference descriptor extraction failed");
                return Err(MatchError::NoReferenceFace);
            }
        };
        if cancel.is_cancelled() {
            return Err(MatchError::Cancelled);
        }
        info!(
            dim = reference.len(),
            candidates = candidates.len(),
            concurrency = self.config.concurrency,
            "reference ready, starting candidate fan-out"
        );
        if let Some(observer) = &self.observer {
            observer.on_reference_ready(reference.len());
        }

        let total = candidates.len();
        let completed = AtomicUsize::new(0);
        let reference = &reference;
        let completed_ref = &completed;

        // Each candidate keeps its input index through the unordered pool so
        // the report can be reassembled deterministically afterwards.
        let fan_out = stream::iter(candidates.into_iter().enumerate())
            .map(|(idx, candidate)| async move {
                let outcome = process_candidate(
                    &candidate,
                    reference,
                    self.extractor.as_ref(),
                    self.source.as_ref(),
                    self.config.threshold,
                    self.config.per_candidate_timeout(),
                    self.extract_lock.as_ref(),
                )
                .await;
                let done = completed_ref.fetch_add(1, Ordering::Relaxed) + 1;
                if let (Some(observer), Ok(outcome)) = (&self.observer, &outcome) {
                    observer.on_candidate(&candidate, outcome, done, total);
                }
                (idx, candidate, outcome)
            })
            .buffer_unordered(self.config.concurrency)
            .collect::<Vec<_>>();

        let mut rows = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(
                    completed = completed.load(Ordering::Relaxed),
                    total,
                    "matching run cancelled"
                );
                return Err(MatchError::Cancelled);
            }
            rows = fan_out => rows,
        };

        rows.sort_by_key(|(idx, _, _)| *idx);
        let mut outcomes = Vec::with_capacity(rows.len());
        for (_, candidate, outcome) in rows {
            outcomes.push(CandidateOutcome {
                candidate,
                outcome: outcome?,
            });
        }

        let report = MatchReport::new(outcomes, started.elapsed());
        info!(
            candidates = report.len(),
            matched = report.matched_count(),
            no_face = report.no_face_count(),
            failed = report.failed_count(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "matching run complete"
        );
        if let Some(observer) = &self.observer {
            observer.on_complete(&report);
        }
        Ok(report)
    }
}
