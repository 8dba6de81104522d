//! Handler and behavior contracts
//!
//! A request type has exactly one [`RequestHandler`] and any number of
//! [`PipelineBehavior`]s. Behaviors wrap the handler: each receives a [`Next`]
//! continuation that resumes the rest of the pipeline.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

use crate::cancel::CancelHandle;
use crate::errors::MediateResult;
use crate::request::Request;

/// Future produced by every pipeline stage
pub type PipelineFuture<'a, T> = BoxFuture<'a, MediateResult<T>>;

/// Performs the operation described by a request.
///
/// Failures should be returned with [`MediateError::handler`](crate::MediateError::handler)
/// so the caller can downcast them back unchanged.
#[async_trait]
pub trait RequestHandler<R, T = ()>: Send + Sync
where
    R: Request<T>,
    T: Send + 'static,
{
    /// Handle the request
    async fn handle(&self, request: &R, token: &CancelHandle) -> MediateResult<T>;
}

/// Middleware wrapped around a request's handler.
///
/// Call `next.run().await` to continue the pipeline; return without calling it to
/// short-circuit. The response of the inner stages comes back through `next`.
#[async_trait]
pub trait PipelineBehavior<R, T = ()>: Send + Sync
where
    R: Request<T>,
    T: Send + 'static,
{
    /// Handle the request, optionally delegating to `next`
    async fn handle(&self, request: &R, next: Next<'_, T>, token: &CancelHandle)
        -> MediateResult<T>;
}

type Continuation<'a, T> = dyn Fn() -> PipelineFuture<'a, T> + Send + Sync + 'a;

/// Continuation that resumes the remainder of the pipeline.
///
/// Cheap to clone. Each `run` starts the inner stages afresh.
pub struct Next<'a, T> {
    continuation: Arc<Continuation<'a, T>>,
}

impl<'a, T> Next<'a, T> {
    /// Wrap a continuation
    pub fn new<F>(continuation: F) -> Self
    where
        F: Fn() -> PipelineFuture<'a, T> + Send + Sync + 'a,
    {
        Self {
            continuation: Arc::new(continuation),
        }
    }

    /// Run the remaining stages
    pub fn run(&self) -> PipelineFuture<'a, T> {
        (self.continuation)()
    }
}

impl<T> Clone for Next<'_, T> {
    fn clone(&self) -> Self {
        Self {
            continuation: Arc::clone(&self.continuation),
        }
    }
}

impl<T> fmt::Debug for Next<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}
