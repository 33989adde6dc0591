//! Progress hooks for a matching run.
//!
//! Callers install a [`MatchObserver`] on a pipeline via
//! [`MatchPipeline::with_observer`](crate::pipeline::MatchPipeline::with_observer)
//! to drive progress bars or streamed results. This keeps frontend plumbing
//! out of the pipeline: any web, CLI, or service layer can subscribe without
//! the core knowing about it.

use crate::types::{Candidate, MatchOutcome, MatchReport};

/// Progress observer for one matching run.
///
/// All methods default to no-ops, so implementors pick the events they care
/// about. Candidate events fire in completion order, not input order;
/// `completed` counts finished candidates including the current one and
/// `total` is the batch size. Callbacks run on worker tasks and should
/// return quickly.
pub trait MatchObserver: Send + Sync {
    /// The reference descriptor was extracted; fan-out is about to begin.
    fn on_reference_ready(&self, _embedding_dim: usize) {}

    /// One candidate finished processing.
    fn on_candidate(
        &self,
        _candidate: &Candidate,
        _outcome: &MatchOutcome,
        _completed: usize,
        _total: usize,
    ) {
    }

    /// The run finished and the report is final.
    fn on_complete(&self, _report: &MatchReport) {}
}
