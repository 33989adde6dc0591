//! The extractor seam: the trait every descriptor backend implements, plus
//! the one-time model-loading gate.
//!
//! Detection, landmarks, and the embedding network are opaque to the
//! pipeline. All it needs is "bytes in, at most one descriptor out" and a
//! way to know the models are ready before the first extraction.

use std::future::Future;

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::error::ExtractError;
use crate::types::Embedding;

/// A face-descriptor backend.
///
/// Shared by every worker of a run, so implementations must either be safe
/// for concurrent `extract` calls or be driven with
/// [`MatchConfig::serialize_extraction`](crate::config::MatchConfig::serialize_extraction)
/// enabled.
#[async_trait]
pub trait DescriptorExtractor: Send + Sync {
    /// Load the detection and embedding models.
    ///
    /// One-time and idempotent: every call after the first completed one
    /// returns immediately, and concurrent callers all wait on the same
    /// initialization. Must complete before any [`extract`](Self::extract)
    /// call.
    async fn load_models(&self) -> Result<(), ExtractError>;

    /// Descriptor of the single most prominent face in the image.
    ///
    /// `Ok(None)` is the no-face signal, a legitimate classification, not a
    /// failure. `Err` means the bytes could not be processed at all.
    async fn extract(&self, bytes: &[u8]) -> Result<Option<Embedding>, ExtractError>;
}

/// One-time initialization gate for model state.
///
/// Wraps the loaded state so backends get an explicit ready/not-ready
/// lifecycle instead of an ad hoc flag: [`ready`](Self::ready) runs the
/// initializer exactly once with concurrent callers waiting on the winner,
/// and [`get`](Self::get) refuses access before that with
/// [`ExtractError::NotReady`].
#[derive(Debug, Default)]
pub struct ModelGate<T> {
    cell: OnceCell<T>,
}

impl<T> ModelGate<T> {
    pub fn new() -> Self {
        ModelGate {
            cell: OnceCell::new(),
        }
    }

    /// Whether initialization has completed.
    pub fn is_ready(&self) -> bool {
        self.cell.initialized()
    }

    /// Initialize once and return the loaded state. Subsequent calls skip
    /// `init`; concurrent callers during initialization all observe the one
    /// result. A failed initialization leaves the gate unlocked so a later
    /// call can retry.
    pub async fn ready<F, Fut>(&self, init: F) -> Result<&T, ExtractError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ExtractError>>,
    {
        self.cell.get_or_try_init(init).await
    }

    /// The loaded state, or [`ExtractError::NotReady`] before
    /// [`ready`](Self::ready) has completed.
    pub fn get(&self) -> Result<&T, ExtractError> {
        self.cell.get().ok_or(ExtractError::NotReady)
    }
}
