//! Service registry: the reference scope resolver
//!
//! Registrations are collected by a [`ServiceRegistryBuilder`] and frozen into a
//! [`ServiceRegistry`], which is also the root scope. Per-call child scopes come
//! from [`ServiceRegistry::create_scope`].
//!
//! Each registration is a factory plus a [`ServiceLifetime`]:
//!
//! - `Singleton`: built once for the whole registry, always against the root scope
//! - `Scoped`: built once per scope (the root counts as its own scope)
//! - `Transient`: built on every resolution
//!
//! Registration order is kept and is the order `resolve_all` returns. For behaviors
//! that order means outermost first.

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use mediate_core::{
    Contract, MediateError, MediateResult, PipelineBehavior, Request, RequestHandler,
    ServiceInstance, ServiceScope,
};

/// How long a resolved instance lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceLifetime {
    /// One instance for the registry
    Singleton,
    /// One instance per scope
    Scoped,
    /// A new instance per resolution
    Transient,
}

type Factory = Arc<dyn Fn(&dyn ServiceScope) -> MediateResult<ServiceInstance> + Send + Sync>;

struct Registration {
    contract: Contract,
    lifetime: ServiceLifetime,
    factory: Factory,
    singleton: OnceCell<ServiceInstance>,
}

/// Collects registrations before the registry is frozen
#[derive(Default)]
pub struct ServiceRegistryBuilder {
    registrations: Vec<Registration>,
}

impl ServiceRegistryBuilder {
    /// Builder with no registrations
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for request `R` answering with `T`
    pub fn add_handler<R, T, H>(
        self,
        lifetime: ServiceLifetime,
        factory: impl Fn(&dyn ServiceScope) -> MediateResult<H> + Send + Sync + 'static,
    ) -> Self
    where
        R: Request<T>,
        T: Send + 'static,
        H: RequestHandler<R, T> + 'static,
    {
        self.push(Contract::handler::<R, T>(), lifetime, move |scope| {
            let handler: Arc<dyn RequestHandler<R, T>> = Arc::new(factory(scope)?);
            Ok(Arc::new(handler) as ServiceInstance)
        })
    }

    /// Register an already built handler as a singleton
    pub fn add_handler_instance<R, T>(self, handler: impl RequestHandler<R, T> + 'static) -> Self
    where
        R: Request<T>,
        T: Send + 'static,
    {
        let handler: Arc<dyn RequestHandler<R, T>> = Arc::new(handler);
        self.push(
            Contract::handler::<R, T>(),
            ServiceLifetime::Singleton,
            move |_| Ok(Arc::new(handler.clone()) as ServiceInstance),
        )
    }

    /// Register a behavior for request `R` answering with `T`.
    ///
    /// Behaviors run in registration order, first registered outermost.
    pub fn add_behavior<R, T, B>(
        self,
        lifetime: ServiceLifetime,
        factory: impl Fn(&dyn ServiceScope) -> MediateResult<B> + Send + Sync + 'static,
    ) -> Self
    where
        R: Request<T>,
        T: Send + 'static,
        B: PipelineBehavior<R, T> + 'static,
    {
        self.push(Contract::behavior::<R, T>(), lifetime, move |scope| {
            let behavior: Arc<dyn PipelineBehavior<R, T>> = Arc::new(factory(scope)?);
            Ok(Arc::new(behavior) as ServiceInstance)
        })
    }

    /// Register an already built behavior as a singleton
    pub fn add_behavior_instance<R, T>(self, behavior: impl PipelineBehavior<R, T> + 'static) -> Self
    where
        R: Request<T>,
        T: Send + 'static,
    {
        let behavior: Arc<dyn PipelineBehavior<R, T>> = Arc::new(behavior);
        self.push(
            Contract::behavior::<R, T>(),
            ServiceLifetime::Singleton,
            move |_| Ok(Arc::new(behavior.clone()) as ServiceInstance),
        )
    }

    /// Register a dependency that factories can resolve with `resolve_service::<S>()`
    pub fn add_service<S>(
        self,
        lifetime: ServiceLifetime,
        factory: impl Fn(&dyn ServiceScope) -> MediateResult<Arc<S>> + Send + Sync + 'static,
    ) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.push(Contract::service::<S>(), lifetime, move |scope| {
            Ok(Arc::new(factory(scope)?) as ServiceInstance)
        })
    }

    /// Register a shared dependency as a singleton
    pub fn add_service_instance<S>(self, service: Arc<S>) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.push(
            Contract::service::<S>(),
            ServiceLifetime::Singleton,
            move |_| Ok(Arc::new(service.clone()) as ServiceInstance),
        )
    }

    fn push(
        mut self,
        contract: Contract,
        lifetime: ServiceLifetime,
        factory: impl Fn(&dyn ServiceScope) -> MediateResult<ServiceInstance> + Send + Sync + 'static,
    ) -> Self {
        tracing::trace!(%contract, ?lifetime, "service registered");
        self.registrations.push(Registration {
            contract,
            lifetime,
            factory: Arc::new(factory),
            singleton: OnceCell::new(),
        });
        self
    }

    /// Freeze the registrations into a registry
    pub fn build(self) -> ServiceRegistry {
        let mut by_contract: HashMap<Contract, Vec<usize>> = HashMap::new();
        for (index, registration) in self.registrations.iter().enumerate() {
            by_contract
                .entry(registration.contract)
                .or_default()
                .push(index);
        }
        tracing::debug!(
            registrations = self.registrations.len(),
            contracts = by_contract.len(),
            "service registry built"
        );
        ServiceRegistry {
            shared: Arc::new(Shared {
                registrations: self.registrations,
                by_contract,
                root_instances: ScopeInstances::default(),
            }),
        }
    }
}

impl fmt::Debug for ServiceRegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistryBuilder")
            .field("registrations", &self.registrations.len())
            .finish()
    }
}

struct Shared {
    registrations: Vec<Registration>,
    by_contract: HashMap<Contract, Vec<usize>>,
    root_instances: ScopeInstances,
}

/// Scoped instances owned by one scope, keyed by registration index
#[derive(Default)]
struct ScopeInstances {
    instances: Mutex<HashMap<usize, ServiceInstance>>,
}

impl ScopeInstances {
    /// First instance stored for `index` wins. The factory runs without the lock
    /// held so it can resolve other scoped services from the same scope.
    fn get_or_create(
        &self,
        index: usize,
        create: impl FnOnce() -> MediateResult<ServiceInstance>,
    ) -> MediateResult<ServiceInstance> {
        if let Some(existing) = self.instances.lock().get(&index) {
            return Ok(existing.clone());
        }
        let created = create()?;
        Ok(self
            .instances
            .lock()
            .entry(index)
            .or_insert(created)
            .clone())
    }

    fn len(&self) -> usize {
        self.instances.lock().len()
    }
}

/// Frozen registrations; also the root scope
#[derive(Clone)]
pub struct ServiceRegistry {
    shared: Arc<Shared>,
}

impl ServiceRegistry {
    /// Start collecting registrations
    pub fn builder() -> ServiceRegistryBuilder {
        ServiceRegistryBuilder::new()
    }

    /// Open a child scope with its own scoped instances
    pub fn create_scope(&self) -> Arc<ScopedServices> {
        Arc::new(ScopedServices {
            root: self.clone(),
            instances: ScopeInstances::default(),
        })
    }

    /// Number of registrations
    pub fn len(&self) -> usize {
        self.shared.registrations.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.shared.registrations.is_empty()
    }

    fn indices(&self, contract: &Contract) -> &[usize] {
        self.shared
            .by_contract
            .get(contract)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Resolve registration `index` on behalf of `scope`, caching per its lifetime
    fn instantiate(
        &self,
        index: usize,
        scope: &dyn ServiceScope,
        scope_instances: &ScopeInstances,
    ) -> MediateResult<ServiceInstance> {
        let registration = &self.shared.registrations[index];
        match registration.lifetime {
            ServiceLifetime::Singleton => registration
                .singleton
                .get_or_try_init(|| (registration.factory)(self))
                .cloned(),
            ServiceLifetime::Scoped => {
                scope_instances.get_or_create(index, || (registration.factory)(scope))
            }
            ServiceLifetime::Transient => (registration.factory)(scope),
        }
    }

    fn resolve_one_in(
        &self,
        contract: &Contract,
        scope: &dyn ServiceScope,
        scope_instances: &ScopeInstances,
    ) -> MediateResult<ServiceInstance> {
        match self.indices(contract) {
            [] => Err(MediateError::HandlerNotFound {
                contract: *contract,
            }),
            [index] => self.instantiate(*index, scope, scope_instances),
            many => Err(MediateError::AmbiguousHandler {
                contract: *contract,
                count: many.len(),
            }),
        }
    }

    fn resolve_all_in(
        &self,
        contract: &Contract,
        scope: &dyn ServiceScope,
        scope_instances: &ScopeInstances,
    ) -> MediateResult<Vec<ServiceInstance>> {
        self.indices(contract)
            .iter()
            .map(|&index| self.instantiate(index, scope, scope_instances))
            .collect()
    }
}

impl ServiceScope for ServiceRegistry {
    fn resolve_one(&self, contract: &Contract) -> MediateResult<ServiceInstance> {
        self.resolve_one_in(contract, self, &self.shared.root_instances)
    }

    fn resolve_all(&self, contract: &Contract) -> MediateResult<Vec<ServiceInstance>> {
        self.resolve_all_in(contract, self, &self.shared.root_instances)
    }

    fn registration_count(&self, contract: &Contract) -> usize {
        self.indices(contract).len()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("registrations", &self.shared.registrations.len())
            .field("contracts", &self.shared.by_contract.len())
            .finish()
    }
}

/// Child scope: shares registrations and singletons with its registry, owns its
/// scoped instances. Dropping it drops them.
pub struct ScopedServices {
    root: ServiceRegistry,
    instances: ScopeInstances,
}

impl ScopedServices {
    /// The registry this scope was opened from
    pub fn root(&self) -> &ServiceRegistry {
        &self.root
    }

    /// Number of scoped instances created in this scope so far
    pub fn scoped_instances(&self) -> usize {
        self.instances.len()
    }
}

impl ServiceScope for ScopedServices {
    fn resolve_one(&self, contract: &Contract) -> MediateResult<ServiceInstance> {
        self.root.resolve_one_in(contract, self, &self.instances)
    }

    fn resolve_all(&self, contract: &Contract) -> MediateResult<Vec<ServiceInstance>> {
        self.root.resolve_all_in(contract, self, &self.instances)
    }

    fn registration_count(&self, contract: &Contract) -> usize {
        self.root.registration_count(contract)
    }
}

impl fmt::Debug for ScopedServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedServices")
            .field("scoped_instances", &self.instances.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use mediate_core::ServiceScopeExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Service that remembers which construction produced it
    struct Session {
        id: usize,
    }

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct Hello;
    impl Greeter for Hello {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    struct Hi;
    impl Greeter for Hi {
        fn greet(&self) -> String {
            "hi".into()
        }
    }

    fn counting_registry(lifetime: ServiceLifetime) -> ServiceRegistry {
        let counter = Arc::new(AtomicUsize::new(0));
        ServiceRegistry::builder()
            .add_service::<Session>(lifetime, move |_| {
                Ok(Arc::new(Session {
                    id: counter.fetch_add(1, Ordering::SeqCst),
                }))
            })
            .build()
    }

    fn session_id(scope: &dyn ServiceScope) -> usize {
        scope.resolve_service::<Session>().map(|s| s.id).unwrap()
    }

    #[test]
    fn singleton_is_shared_across_scopes() {
        let registry = counting_registry(ServiceLifetime::Singleton);
        let a = registry.create_scope();
        let b = registry.create_scope();
        assert_eq!(session_id(&*a), 0);
        assert_eq!(session_id(&*b), 0);
        assert_eq!(session_id(&registry), 0);
        assert_eq!(a.scoped_instances(), 0);
    }

    #[test]
    fn scoped_is_per_scope() {
        let registry = counting_registry(ServiceLifetime::Scoped);
        let a = registry.create_scope();
        let b = registry.create_scope();
        assert_eq!(session_id(&*a), 0);
        assert_eq!(session_id(&*a), 0);
        assert_eq!(session_id(&*b), 1);
        assert_eq!(a.scoped_instances(), 1);
    }

    #[test]
    fn transient_is_per_resolution() {
        let registry = counting_registry(ServiceLifetime::Transient);
        let scope = registry.create_scope();
        assert_eq!(session_id(&*scope), 0);
        assert_eq!(session_id(&*scope), 1);
    }

    #[test]
    fn resolve_all_keeps_registration_order() {
        let registry = ServiceRegistry::builder()
            .add_service_instance::<dyn Greeter>(Arc::new(Hi))
            .add_service_instance::<dyn Greeter>(Arc::new(Hello))
            .build();

        let greetings: Vec<String> = registry
            .resolve_services::<dyn Greeter>()
            .unwrap()
            .iter()
            .map(|g| g.greet())
            .collect();
        assert_eq!(greetings, vec!["hi", "hello"]);
        assert_eq!(registry.registration_count(&Contract::service::<dyn Greeter>()), 2);
        assert_matches!(
            registry.resolve_service::<dyn Greeter>().map(|g| g.greet()),
            Err(MediateError::AmbiguousHandler { count: 2, .. })
        );
    }

    #[test]
    fn unknown_contract_resolves_to_nothing() {
        let registry = ServiceRegistry::builder().build();
        assert!(registry.is_empty());
        assert!(registry.resolve_services::<dyn Greeter>().unwrap().is_empty());
        assert_matches!(
            registry.resolve_service::<dyn Greeter>().map(|g| g.greet()),
            Err(MediateError::HandlerNotFound { .. })
        );
    }

    #[test]
    fn scoped_factories_see_their_scope() {
        struct Repository {
            session: Arc<Session>,
        }

        let counter = Arc::new(AtomicUsize::new(0));
        let registry = ServiceRegistry::builder()
            .add_service::<Session>(ServiceLifetime::Scoped, move |_| {
                Ok(Arc::new(Session {
                    id: counter.fetch_add(1, Ordering::SeqCst),
                }))
            })
            .add_service::<Repository>(ServiceLifetime::Transient, |scope| {
                Ok(Arc::new(Repository {
                    session: scope.resolve_service::<Session>()?,
                }))
            })
            .build();

        let scope = registry.create_scope();
        let first = scope.resolve_service::<Repository>().unwrap();
        let second = scope.resolve_service::<Repository>().unwrap();
        assert!(Arc::ptr_eq(&first.session, &second.session));

        let other = registry.create_scope();
        let third = other.resolve_service::<Repository>().unwrap();
        assert_ne!(first.session.id, third.session.id);
    }

    #[test]
    fn failing_factory_is_not_cached() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = attempts.clone();
        let registry = ServiceRegistry::builder()
            .add_service::<Session>(ServiceLifetime::Singleton, move |_| {
                let attempt = seen.fetch_add(1, Ordering::SeqCst);
                if attempt == 0 {
                    Err(MediateError::construction(
                        Contract::service::<Session>(),
                        "database offline",
                    ))
                } else {
                    Ok(Arc::new(Session { id: attempt }))
                }
            })
            .build();

        assert_matches!(
            registry.resolve_service::<Session>().map(|s| s.id),
            Err(MediateError::Construction { .. })
        );
        assert_eq!(session_id(&registry), 1);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
