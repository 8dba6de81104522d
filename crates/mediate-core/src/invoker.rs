//! Invoker compiler
//!
//! Turns a concrete request type into two type-erased call adapters:
//!
//! - a handler invoker: `(scope, request, token)` resolves the one handler from the
//!   scope and calls it;
//! - a behavior invoker: `(behavior, request, next, token)` calls one already
//!   resolved behavior.
//!
//! Adapters are monomorphized once per `(R, T)` and hold no instances, so the same
//! adapters can be cached and reused with any scope.

use std::any::{type_name, Any};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::cancel::CancelHandle;
use crate::contract::Contract;
use crate::errors::{MediateError, MediateResult};
use crate::handler::{Next, PipelineBehavior, PipelineFuture, RequestHandler};
use crate::request::{Request, RequestType};
use crate::scope::{downcast_instance, ServiceInstance, ServiceScope};

/// Type-erased "resolve the handler and call it" adapter
pub trait HandlerInvoker<T>: Send + Sync {
    /// Resolve the handler from `scope` and invoke it with `request`
    fn invoke<'a>(
        &'a self,
        scope: &'a dyn ServiceScope,
        request: &'a (dyn Any + Send + Sync),
        token: &'a CancelHandle,
    ) -> PipelineFuture<'a, T>;
}

/// Type-erased "call this behavior" adapter
pub trait BehaviorInvoker<T>: Send + Sync {
    /// Invoke an already resolved `behavior` around `next`
    fn invoke<'a>(
        &'a self,
        behavior: &'a ServiceInstance,
        request: &'a (dyn Any + Send + Sync),
        next: Next<'a, T>,
        token: &'a CancelHandle,
    ) -> PipelineFuture<'a, T>;
}

/// Everything needed to dispatch one concrete request type
pub struct CompiledInvokers<T> {
    /// Concrete request and response types
    pub request_type: RequestType,
    /// Contract the single handler is resolved under
    pub handler_contract: Contract,
    /// Contract behaviors are resolved under, in order
    pub behavior_contract: Contract,
    /// Resolves and calls the handler
    pub handler: Arc<dyn HandlerInvoker<T>>,
    /// Calls one resolved behavior
    pub behavior: Arc<dyn BehaviorInvoker<T>>,
}

impl<T> fmt::Debug for CompiledInvokers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledInvokers")
            .field("request_type", &self.request_type)
            .field("handler_contract", &self.handler_contract)
            .field("behavior_contract", &self.behavior_contract)
            .finish_non_exhaustive()
    }
}

/// Build the adapters for request `R` answering with `T`
pub fn compile<R, T>() -> CompiledInvokers<T>
where
    R: Request<T>,
    T: Send + 'static,
{
    let handler_contract = Contract::handler::<R, T>();
    let behavior_contract = Contract::behavior::<R, T>();
    CompiledInvokers {
        request_type: RequestType::of::<R, T>(),
        handler_contract,
        behavior_contract,
        handler: Arc::new(TypedHandlerInvoker::<R, T> {
            contract: handler_contract,
            _marker: PhantomData,
        }),
        behavior: Arc::new(TypedBehaviorInvoker::<R, T> {
            contract: behavior_contract,
            _marker: PhantomData,
        }),
    }
}

struct TypedHandlerInvoker<R, T> {
    contract: Contract,
    _marker: PhantomData<fn() -> (R, T)>,
}

impl<R, T> HandlerInvoker<T> for TypedHandlerInvoker<R, T>
where
    R: Request<T>,
    T: Send + 'static,
{
    fn invoke<'a>(
        &'a self,
        scope: &'a dyn ServiceScope,
        request: &'a (dyn Any + Send + Sync),
        token: &'a CancelHandle,
    ) -> PipelineFuture<'a, T> {
        Box::pin(async move {
            let instance = scope.resolve_one(&self.contract)?;
            let handler =
                downcast_instance::<Arc<dyn RequestHandler<R, T>>>(&instance, &self.contract)?;
            let request = concrete_request::<R>(request, &self.contract)?;
            handler.handle(request, token).await
        })
    }
}

struct TypedBehaviorInvoker<R, T> {
    contract: Contract,
    _marker: PhantomData<fn() -> (R, T)>,
}

impl<R, T> BehaviorInvoker<T> for TypedBehaviorInvoker<R, T>
where
    R: Request<T>,
    T: Send + 'static,
{
    fn invoke<'a>(
        &'a self,
        behavior: &'a ServiceInstance,
        request: &'a (dyn Any + Send + Sync),
        next: Next<'a, T>,
        token: &'a CancelHandle,
    ) -> PipelineFuture<'a, T> {
        Box::pin(async move {
            let behavior =
                downcast_instance::<Arc<dyn PipelineBehavior<R, T>>>(behavior, &self.contract)?;
            let request = concrete_request::<R>(request, &self.contract)?;
            behavior.handle(request, next, token).await
        })
    }
}

fn concrete_request<'a, R: 'static>(
    request: &'a (dyn Any + Send + Sync),
    contract: &Contract,
) -> MediateResult<&'a R> {
    request
        .downcast_ref::<R>()
        .ok_or(MediateError::ContractMismatch {
            contract: *contract,
            expected: type_name::<R>(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::NeverCancel;
    use crate::contract::ContractKind;
    use async_trait::async_trait;
    use assert_matches::assert_matches;

    struct Double(u32);
    impl Request<u32> for Double {}

    struct DoubleHandler;

    #[async_trait]
    impl RequestHandler<Double, u32> for DoubleHandler {
        async fn handle(&self, request: &Double, _token: &CancelHandle) -> MediateResult<u32> {
            Ok(request.0 * 2)
        }
    }

    struct PlusOne;

    #[async_trait]
    impl PipelineBehavior<Double, u32> for PlusOne {
        async fn handle(
            &self,
            _request: &Double,
            next: Next<'_, u32>,
            _token: &CancelHandle,
        ) -> MediateResult<u32> {
            Ok(next.run().await? + 1)
        }
    }

    /// Scope that always hands out the same handler
    struct SingleHandler(ServiceInstance);

    impl ServiceScope for SingleHandler {
        fn resolve_one(&self, _contract: &Contract) -> MediateResult<ServiceInstance> {
            Ok(self.0.clone())
        }

        fn resolve_all(&self, _contract: &Contract) -> MediateResult<Vec<ServiceInstance>> {
            Ok(vec![self.0.clone()])
        }

        fn registration_count(&self, _contract: &Contract) -> usize {
            1
        }
    }

    fn handler_scope() -> SingleHandler {
        let handler: Arc<dyn RequestHandler<Double, u32>> = Arc::new(DoubleHandler);
        SingleHandler(Arc::new(handler))
    }

    #[test]
    fn compile_derives_contracts_from_types() {
        let compiled = compile::<Double, u32>();
        assert_eq!(compiled.handler_contract.kind(), ContractKind::Handler);
        assert_eq!(compiled.behavior_contract.kind(), ContractKind::Behavior);
        assert_eq!(compiled.request_type, RequestType::of::<Double, u32>());
    }

    #[tokio::test]
    async fn handler_invoker_resolves_and_calls() {
        let compiled = compile::<Double, u32>();
        let scope = handler_scope();
        let token = NeverCancel::handle();
        let request = Double(21);

        let result = compiled.handler.invoke(&scope, &request, &token).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn behavior_invoker_wraps_next() {
        let compiled = compile::<Double, u32>();
        let scope = handler_scope();
        let token = NeverCancel::handle();
        let request = Double(5);
        let behavior: Arc<dyn PipelineBehavior<Double, u32>> = Arc::new(PlusOne);
        let behavior: ServiceInstance = Arc::new(behavior);

        let handler = &compiled.handler;
        let (scope_ref, request_ref, token_ref) = (&scope, &request, &token);
        let next = Next::new(move || handler.invoke(scope_ref, request_ref, token_ref));
        let result = compiled
            .behavior
            .invoke(&behavior, &request, next, &token)
            .await;
        assert_eq!(result.unwrap(), 11);
    }

    #[tokio::test]
    async fn mismatched_request_is_reported() {
        let compiled = compile::<Double, u32>();
        let scope = handler_scope();
        let token = NeverCancel::handle();
        let wrong = String::from("not a Double");

        let result = compiled.handler.invoke(&scope, &wrong, &token).await;
        assert_matches!(result, Err(MediateError::ContractMismatch { .. }));
    }
}
