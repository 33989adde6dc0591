//! Face descriptor matching for one reference selfie against an ordered set
//! of candidate photos.
//!
//! The crate compares face descriptors by Euclidean distance under a strict
//! threshold, fans candidate processing out over a bounded concurrent pool,
//! and reports per-candidate outcomes in input order. Failures of a single
//! candidate (unreadable image, no detectable face) stay inside that
//! candidate's report row instead of aborting the run.
//!
//! [`MatchPipeline`] is the main entry point; [`match_candidates`] wraps it
//! for one-shot use. The descriptor backend and the image source are trait
//! seams ([`DescriptorExtractor`], [`ImageSource`]) with bundled
//! implementations: [`HashExtractor`] for deterministic content-hash
//! descriptors, plus [`MemorySource`], [`FileSource`] and (behind the `http`
//! feature) [`HttpSource`].

mod cancel;
mod compare;
mod config;
mod error;
mod extractor;
#[cfg(feature = "http")]
mod http;
mod observer;
mod pipeline;
mod process;
mod source;
mod stub;
mod types;

pub use cancel::CancelToken;
pub use compare::{Comparison, compare, euclidean_distance};
pub use config::{ConfigError, ExtractorConfig, FacematchConfig, MatchConfig, SourceConfig};
pub use error::{ExtractError, MatchError, SourceError};
pub use extractor::{DescriptorExtractor, ModelGate};
#[cfg(feature = "http")]
pub use http::HttpSource;
pub use observer::MatchObserver;
pub use pipeline::MatchPipeline;
pub use source::{FileSource, ImageSource, MemorySource, source_from_config};
pub use stub::HashExtractor;
pub use types::{Candidate, CandidateOutcome, Embedding, MatchOutcome, MatchReport};

use std::sync::Arc;

/// One-shot matching run: builds a [`MatchPipeline`] and consumes it.
///
/// Callers that match repeatedly against the same backend should construct
/// the pipeline once instead, so the extractor's models stay loaded.
pub async fn match_candidates(
    reference: &[u8],
    candidates: Vec<Candidate>,
    extractor: Arc<dyn DescriptorExtractor>,
    source: Arc<dyn ImageSource>,
    config: MatchConfig,
) -> Result<MatchReport, MatchError> {
    MatchPipeline::new(extractor, source, config)?
        .run(reference, candidates)
        .await
}
