//! Scope resolver boundary
//!
//! The mediator never constructs handlers or behaviors. It asks a [`ServiceScope`]
//! for instances on every call, so scoped dependencies (one session per inbound
//! request, say) stay correct while dispatch plans are shared process-wide.
//!
//! Instances are stored type-erased. By convention the value inside a
//! [`ServiceInstance`] is an `Arc` of the contract's shape:
//!
//! | contract                        | concrete value inside the instance     |
//! |---------------------------------|----------------------------------------|
//! | `Contract::handler::<R, T>()`   | `Arc<dyn RequestHandler<R, T>>`        |
//! | `Contract::behavior::<R, T>()`  | `Arc<dyn PipelineBehavior<R, T>>`      |
//! | `Contract::service::<S>()`      | `Arc<S>`                               |

use std::any::{type_name, Any};
use std::sync::Arc;

use crate::contract::Contract;
use crate::errors::{MediateError, MediateResult};

/// A resolved, type-erased instance
pub type ServiceInstance = Arc<dyn Any + Send + Sync>;

/// Per-call resolution context supplied by the registration collaborator
pub trait ServiceScope: Send + Sync {
    /// Resolve the single implementation of `contract`.
    ///
    /// # Errors
    ///
    /// [`MediateError::HandlerNotFound`] when nothing is registered and
    /// [`MediateError::AmbiguousHandler`] when more than one implementation is.
    fn resolve_one(&self, contract: &Contract) -> MediateResult<ServiceInstance>;

    /// Resolve every implementation of `contract` in registration order.
    ///
    /// An empty vector is a valid answer.
    fn resolve_all(&self, contract: &Contract) -> MediateResult<Vec<ServiceInstance>>;

    /// Number of implementations registered for `contract`, without constructing any
    fn registration_count(&self, contract: &Contract) -> usize;
}

/// Typed resolution helpers available on every scope
pub trait ServiceScopeExt: ServiceScope {
    /// Resolve the single registered `S`
    fn resolve_service<S>(&self) -> MediateResult<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        let contract = Contract::service::<S>();
        let instance = self.resolve_one(&contract)?;
        downcast_instance::<Arc<S>>(&instance, &contract)
    }

    /// Resolve every registered `S` in registration order
    fn resolve_services<S>(&self) -> MediateResult<Vec<Arc<S>>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        let contract = Contract::service::<S>();
        self.resolve_all(&contract)?
            .iter()
            .map(|instance| downcast_instance::<Arc<S>>(instance, &contract))
            .collect()
    }
}

impl<X: ServiceScope + ?Sized> ServiceScopeExt for X {}

/// Clone the concrete value `I` out of an instance resolved for `contract`.
///
/// # Errors
///
/// [`MediateError::ContractMismatch`] when the instance holds something else.
pub fn downcast_instance<I>(instance: &ServiceInstance, contract: &Contract) -> MediateResult<I>
where
    I: Clone + 'static,
{
    instance
        .downcast_ref::<I>()
        .cloned()
        .ok_or(MediateError::ContractMismatch {
            contract: *contract,
            expected: type_name::<I>(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    trait Clock: Send + Sync {
        fn now(&self) -> u64;
    }

    struct FixedClock(u64);

    impl Clock for FixedClock {
        fn now(&self) -> u64 {
            self.0
        }
    }

    /// Scope holding a fixed list of clocks
    struct ClockScope {
        clocks: Vec<ServiceInstance>,
    }

    impl ServiceScope for ClockScope {
        fn resolve_one(&self, contract: &Contract) -> MediateResult<ServiceInstance> {
            match self.clocks.as_slice() {
                [] => Err(MediateError::HandlerNotFound {
                    contract: *contract,
                }),
                [only] => Ok(only.clone()),
                many => Err(MediateError::AmbiguousHandler {
                    contract: *contract,
                    count: many.len(),
                }),
            }
        }

        fn resolve_all(&self, _contract: &Contract) -> MediateResult<Vec<ServiceInstance>> {
            Ok(self.clocks.clone())
        }

        fn registration_count(&self, _contract: &Contract) -> usize {
            self.clocks.len()
        }
    }

    fn clock(at: u64) -> ServiceInstance {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(at));
        Arc::new(clock)
    }

    #[test]
    fn typed_helpers_unwrap_the_arc_convention() {
        let scope = ClockScope {
            clocks: vec![clock(7)],
        };
        let resolved = scope.resolve_service::<dyn Clock>().unwrap();
        assert_eq!(resolved.now(), 7);

        let scope = ClockScope {
            clocks: vec![clock(1), clock(2)],
        };
        let all: Vec<u64> = scope
            .resolve_services::<dyn Clock>()
            .unwrap()
            .iter()
            .map(|c| c.now())
            .collect();
        assert_eq!(all, vec![1, 2]);
        assert_matches!(
            scope.resolve_service::<dyn Clock>().map(|c| c.now()),
            Err(MediateError::AmbiguousHandler { count: 2, .. })
        );
    }

    #[test]
    fn wrong_shape_is_a_contract_mismatch() {
        let instance: ServiceInstance = Arc::new(42_u32);
        let result = downcast_instance::<Arc<dyn Clock>>(&instance, &Contract::service::<dyn Clock>())
            .map(|c| c.now());
        assert_matches!(result, Err(MediateError::ContractMismatch { .. }));
    }
}
