//! Runtime-agnostic cooperative cancellation.
//!
//! The mediator threads one token through every adapter and behavior without
//! inspecting it; handlers and behaviors decide what cancellation means.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

/// Cooperative cancellation token.
#[async_trait]
pub trait CancellationToken: Send + Sync + std::fmt::Debug {
    /// Resolves when cancellation is requested.
    async fn cancelled(&self);

    /// Non-blocking cancellation check.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Shared handle to a cancellation token, as threaded through a dispatch.
pub type CancelHandle = Arc<dyn CancellationToken>;

/// Cancellation token that never triggers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverCancel;

impl NeverCancel {
    /// Shared handle to a token that never fires
    pub fn handle() -> CancelHandle {
        Arc::new(NeverCancel)
    }
}

#[async_trait]
impl CancellationToken for NeverCancel {
    async fn cancelled(&self) {
        futures::future::pending::<()>().await;
    }
}

/// Owner side of a cancellable call: hands out tokens and flips them.
#[derive(Debug)]
pub struct CancellationSource {
    cancel_tx: watch::Sender<bool>,
}

impl CancellationSource {
    /// Source whose tokens are not yet cancelled
    pub fn new() -> Self {
        let (cancel_tx, _cancel_rx) = watch::channel(false);
        Self { cancel_tx }
    }

    /// Request cancellation; every token from this source observes it.
    pub fn cancel(&self) {
        // send_replace never fails, even with no live receivers
        self.cancel_tx.send_replace(true);
    }

    /// Whether `cancel` has been called
    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    /// New token observing this source
    pub fn token(&self) -> CancelHandle {
        Arc::new(SourceToken {
            cancel_rx: self.cancel_tx.subscribe(),
        })
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct SourceToken {
    cancel_rx: watch::Receiver<bool>,
}

#[async_trait]
impl CancellationToken for SourceToken {
    async fn cancelled(&self) {
        let mut cancel_rx = self.cancel_rx.clone();
        loop {
            if *cancel_rx.borrow() {
                return;
            }
            // Source dropped without cancelling: never fires
            if cancel_rx.changed().await.is_err() {
                futures::future::pending::<()>().await;
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }
}
