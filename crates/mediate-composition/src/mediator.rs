//! The mediator: `send` and `send_with_response`
//!
//! Every call runs the same steps:
//!
//! 1. reject an absent request with [`MediateError::InvalidArgument`];
//! 2. read the concrete request type off the erased request;
//! 3. fetch or build the [`DispatchPlan`] for that type;
//! 4. pick the call's scope from the [`CallContext`], else the root scope;
//! 5. resolve the behaviors from that scope, fold them around the handler and run.
//!
//! Handler and behavior failures come back exactly as they were raised. The mediator
//! does not retry, wrap, time-limit or cancel anything.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

use mediate_core::{
    CallContext, ConfigError, MediateConfig, MediateError, MediateResult, MediatorConfig,
    ServiceScope, SharedRequest,
};

use crate::composer::{build_plan, compose_pipeline};
use crate::plan::{DispatchPlan, PlanCache, PlanCacheStats, PlanKey};

/// In-process request dispatcher
pub struct Mediator {
    root: Arc<dyn ServiceScope>,
    plans: PlanCache,
    trace_dispatch: bool,
    slow_dispatch_threshold: Option<Duration>,
}

impl Mediator {
    /// Mediator resolving from `root` when a call carries no scope
    pub fn new(root: Arc<dyn ServiceScope>) -> Self {
        Self::from_parts(root, &MediatorConfig::default())
    }

    /// Mediator configured by `config`.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Validation`] when `config` does not validate.
    pub fn with_config(root: Arc<dyn ServiceScope>, config: &MediatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_parts(root, config))
    }

    fn from_parts(root: Arc<dyn ServiceScope>, config: &MediatorConfig) -> Self {
        Self {
            root,
            plans: PlanCache::with_config(config),
            trace_dispatch: config.trace_dispatch,
            slow_dispatch_threshold: config.slow_dispatch_threshold(),
        }
    }

    /// Dispatch a fire-and-forget request
    pub async fn send(&self, ctx: &CallContext, request: Option<SharedRequest>) -> MediateResult<()> {
        self.send_with_response(ctx, request).await
    }

    /// Dispatch a request and return its handler's response, as seen through every
    /// behavior layer
    pub async fn send_with_response<T>(
        &self,
        ctx: &CallContext,
        request: Option<SharedRequest<T>>,
    ) -> MediateResult<T>
    where
        T: Send + 'static,
    {
        let Some(request) = request else {
            tracing::warn!("send called without a request");
            return Err(MediateError::invalid_argument("request", "request must be present"));
        };

        let request_type = request.request_type();
        let scope: &dyn ServiceScope = match ctx.scope() {
            Some(scope) => scope.as_ref(),
            None => self.root.as_ref(),
        };

        let plan = self
            .plans
            .get_or_build(PlanKey::from(request_type), || {
                build_plan(scope, request.compile_invokers())
            })?;

        let span = if self.trace_dispatch {
            tracing::debug_span!(
                "mediate.dispatch",
                request = request_type.name(),
                shape = ?request_type.shape(),
                scoped = ctx.scope().is_some(),
            )
        } else {
            tracing::Span::none()
        };

        let started = Instant::now();
        let result = Self::execute(&plan, scope, request.as_any(), ctx)
            .instrument(span)
            .await;
        self.report(request_type.name(), started.elapsed(), &result);
        result
    }

    async fn execute<T>(
        plan: &DispatchPlan<T>,
        scope: &dyn ServiceScope,
        request: &(dyn std::any::Any + Send + Sync),
        ctx: &CallContext,
    ) -> MediateResult<T>
    where
        T: Send + 'static,
    {
        let behaviors = scope.resolve_all(plan.behavior_contract())?;
        tracing::trace!(behaviors = behaviors.len(), "pipeline resolved");
        let pipeline = compose_pipeline(plan, scope, &behaviors, request, ctx.token());
        pipeline.run().await
    }

    fn report<T>(&self, request: &'static str, elapsed: Duration, result: &MediateResult<T>) {
        let elapsed_ms = elapsed.as_millis() as u64;
        if let Some(threshold) = self.slow_dispatch_threshold {
            if elapsed > threshold {
                tracing::warn!(
                    request,
                    elapsed_ms,
                    threshold_ms = threshold.as_millis() as u64,
                    "slow dispatch"
                );
            }
        }
        // Plan build failures return before this point and are logged by `build_plan`
        if let Err(err) = result {
            if err.is_dispatch_error() {
                tracing::warn!(request, error = %err, "dispatch failed");
            }
        }
    }

    /// Number of dispatch plans built and retained so far
    pub fn cached_plans(&self) -> usize {
        self.plans.len()
    }

    /// Counters of the plan cache
    pub fn stats(&self) -> PlanCacheStats {
        self.plans.stats()
    }

    /// The scope used when a call carries none
    pub fn root(&self) -> &Arc<dyn ServiceScope> {
        &self.root
    }
}

impl std::fmt::Debug for Mediator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mediator")
            .field("plans", &self.plans)
            .field("trace_dispatch", &self.trace_dispatch)
            .field("slow_dispatch_threshold", &self.slow_dispatch_threshold)
            .finish_non_exhaustive()
    }
}
