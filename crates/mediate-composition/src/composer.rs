//! Pipeline composer
//!
//! `build_plan` turns compiled adapters into a [`DispatchPlan`] once the handler
//! contract is known to have exactly one registration. `compose_pipeline` builds
//! the per-call closure chain from a plan and the behaviors resolved for the call.

use std::any::Any;

use mediate_core::{
    CancelHandle, CompiledInvokers, MediateError, MediateResult, Next, ServiceInstance,
    ServiceScope,
};

use crate::plan::DispatchPlan;

/// Check the handler registration in `scope` and bundle `compiled` into a plan.
///
/// # Errors
///
/// [`MediateError::HandlerNotFound`] for zero handler registrations and
/// [`MediateError::AmbiguousHandler`] for more than one.
pub fn build_plan<T>(
    scope: &dyn ServiceScope,
    compiled: CompiledInvokers<T>,
) -> MediateResult<DispatchPlan<T>> {
    let contract = compiled.handler_contract;
    match scope.registration_count(&contract) {
        0 => {
            tracing::warn!(%contract, "no handler registered");
            Err(MediateError::HandlerNotFound { contract })
        }
        1 => {
            tracing::debug!(
                request = compiled.request_type.name(),
                shape = ?compiled.request_type.shape(),
                "building dispatch plan"
            );
            Ok(DispatchPlan::new(compiled))
        }
        count => {
            tracing::warn!(%contract, count, "multiple handlers registered");
            Err(MediateError::AmbiguousHandler { contract, count })
        }
    }
}

/// Fold `behaviors` (outermost first) around the plan's handler adapter.
///
/// The fold runs from the innermost behavior outwards, so running the result enters
/// `behaviors[0]` first and the handler last, then unwinds in reverse.
pub fn compose_pipeline<'a, T>(
    plan: &'a DispatchPlan<T>,
    scope: &'a dyn ServiceScope,
    behaviors: &'a [ServiceInstance],
    request: &'a (dyn Any + Send + Sync),
    token: &'a CancelHandle,
) -> Next<'a, T>
where
    T: Send + 'static,
{
    let handler = plan.handler();
    let seed = Next::new(move || handler.invoke(scope, request, token));

    let invoker = plan.behavior();
    behaviors.iter().rev().fold(seed, |inner, behavior| {
        Next::new(move || invoker.invoke(behavior, request, inner.clone(), token))
    })
}
