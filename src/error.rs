//! Error taxonomy for the matching pipeline.
//!
//! Only [`MatchError`] aborts a whole run. Per-candidate conditions never
//! reach it: they are classified into
//! [`MatchOutcome`](crate::types::MatchOutcome) rows so one bad photo cannot
//! take the batch down with it.

use thiserror::Error;

/// Run-level failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MatchError {
    /// The reference photo yielded no extractable embedding, either because
    /// no face was detected or because extraction failed on it. Without a
    /// reference descriptor there is nothing to compare against, so no
    /// candidate work is started.
    #[error("no usable face in the reference photo")]
    NoReferenceFace,

    /// The extractor's one-time model load failed; no extraction can run.
    #[error("descriptor models failed to load: {0}")]
    ModelLoad(String),

    /// Two embeddings of different lengths reached the comparator. This is a
    /// programming-contract violation (mixed extractors inside one run), not
    /// a user-facing condition.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The run was cancelled; in-flight work was abandoned and no report was
    /// produced.
    #[error("matching run cancelled")]
    Cancelled,

    /// Rejected configuration (see [`MatchConfig::validate`](crate::config::MatchConfig::validate)).
    #[error("invalid match config: {0}")]
    InvalidConfig(String),
}

/// Errors while resolving a candidate locator to image bytes.
///
/// The pipeline renders these into `LoadFailed` outcomes; they are never
/// fatal to a run.
#[derive(Debug, Error)]
pub enum SourceError {
    /// No image exists for the locator.
    #[error("no image found for locator `{0}`")]
    NotFound(String),

    /// The locator itself is unacceptable to this source.
    #[error("locator `{locator}` rejected: {reason}")]
    InvalidLocator { locator: String, reason: String },

    /// Reading the image failed after the locator resolved.
    #[error("read failed for `{locator}`: {reason}")]
    Io { locator: String, reason: String },

    /// The image exceeds the source's configured size cap.
    #[error("image at `{locator}` exceeds the {limit}-byte limit")]
    TooLarge { locator: String, limit: usize },

    /// The HTTP request could not be completed.
    #[error("request for `{locator}` failed: {reason}")]
    Request { locator: String, reason: String },

    /// The server answered with a non-success status.
    #[error("`{locator}` returned HTTP {status}")]
    Status { locator: String, status: u16 },
}

/// Errors from a descriptor extractor backend.
///
/// `Ok(None)` from `extract` is the no-face signal and is *not* an error;
/// these variants cover inputs or backends that could not be used at all.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// `extract` was called before `load_models` completed.
    #[error("descriptor models are not loaded")]
    NotReady,

    /// The bytes are not a decodable image.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// Backend-specific failure (model inference, device, download).
    #[error("extractor backend error: {0}")]
    Backend(String),
}
