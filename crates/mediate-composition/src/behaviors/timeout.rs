//! Timeout behavior
//!
//! Bounds the time spent in the inner pipeline. The mediator itself never
//! time-limits a call; registering this behavior is an explicit choice.

use async_trait::async_trait;
use std::time::Duration;

use mediate_core::{
    CancelHandle, MediateError, MediateResult, Next, PipelineBehavior, Request, RequestType,
};

/// The inner pipeline did not finish within the limit
#[derive(Debug, Clone, thiserror::Error)]
#[error("{request} timed out after {limit:?}")]
pub struct TimedOut {
    /// Name of the request type
    pub request: &'static str,
    /// Limit that elapsed
    pub limit: Duration,
}

/// Behavior that fails the call with [`TimedOut`] once `limit` elapses
#[derive(Debug, Clone, Copy)]
pub struct TimeoutBehavior {
    limit: Duration,
}

impl TimeoutBehavior {
    /// Behavior failing after `limit`
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }

    /// The configured limit
    pub fn limit(&self) -> Duration {
        self.limit
    }
}

#[async_trait]
impl<R, T> PipelineBehavior<R, T> for TimeoutBehavior
where
    R: Request<T>,
    T: Send + 'static,
{
    async fn handle(&self, _request: &R, next: Next<'_, T>, _token: &CancelHandle) -> MediateResult<T> {
        match tokio::time::timeout(self.limit, next.run()).await {
            Ok(result) => result,
            Err(_) => {
                let request = RequestType::of::<R, T>().name();
                tracing::warn!(request, limit_ms = self.limit.as_millis() as u64, "request timed out");
                Err(MediateError::behavior(TimedOut {
                    request,
                    limit: self.limit,
                }))
            }
        }
    }
}
