//! Tracing behavior
//!
//! Wraps the rest of the pipeline in a span and logs entry, exit and duration.

use async_trait::async_trait;
use std::time::Instant;
use tracing::Instrument;

use mediate_core::{CancelHandle, MediateResult, Next, PipelineBehavior, Request, RequestType};

/// Behavior that adds structured logging around the inner pipeline
#[derive(Debug, Clone)]
pub struct TracingBehavior {
    service_name: String,
}

impl TracingBehavior {
    /// Behavior tagging its span with `service_name`
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }
}

impl Default for TracingBehavior {
    fn default() -> Self {
        Self::new("mediate")
    }
}

#[async_trait]
impl<R, T> PipelineBehavior<R, T> for TracingBehavior
where
    R: Request<T>,
    T: Send + 'static,
{
    async fn handle(&self, _request: &R, next: Next<'_, T>, token: &CancelHandle) -> MediateResult<T> {
        let request_type = RequestType::of::<R, T>();
        let span = tracing::debug_span!(
            "mediate.request",
            service = %self.service_name,
            request = request_type.name(),
            shape = ?request_type.shape(),
        );

        async move {
            tracing::debug!(cancelled = token.is_cancelled(), "handling request");
            let started = Instant::now();
            let result = next.run().await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            match &result {
                Ok(_) => tracing::debug!(elapsed_ms, "request handled"),
                Err(e) if e.is_dispatch_error() => {
                    tracing::warn!(elapsed_ms, error = %e, "request could not be dispatched")
                }
                Err(e) => tracing::debug!(elapsed_ms, error = %e, "request failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}
