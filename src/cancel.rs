//! Cooperative cancellation for in-flight runs.

use std::sync::Arc;

use tokio::sync::watch;

/// Cancellation handle for a matching run.
///
/// Clones share state: cancelling any clone cancels every run the token was
/// passed to. Cancellation is one-way and sticky; once requested it cannot
/// be rescinded. Typical use is handing one clone to a signal handler or UI
/// layer while the other drives
/// [`run_with_cancel`](crate::pipeline::MatchPipeline::run_with_cancel).
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        CancelToken {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called on any clone.
    pub(crate) async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
