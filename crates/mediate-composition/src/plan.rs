//! Dispatch plans and the process-wide plan cache
//!
//! A [`DispatchPlan`] is built once per concrete `(request, response)` pair and is
//! immutable afterwards. It carries the compiled call adapters and the contracts
//! to resolve, never resolved instances, so one plan serves every scope.
//!
//! The [`PlanCache`] is a concurrent map with get-or-create publication: racing
//! builders for the same key may both build, exactly one plan is retained, and every
//! racer continues with the retained plan. Failed builds are not recorded.

use dashmap::DashMap;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use mediate_core::{
    BehaviorInvoker, CompiledInvokers, Contract, HandlerInvoker, MediateResult, MediatorConfig,
    RequestType,
};

/// Cache key: the concrete request type together with its response type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlanKey(RequestType);

impl PlanKey {
    /// Request and response types of the key
    pub fn request_type(&self) -> RequestType {
        self.0
    }
}

impl From<RequestType> for PlanKey {
    fn from(request_type: RequestType) -> Self {
        Self(request_type)
    }
}

/// Reusable, immutable recipe for dispatching one concrete request type
pub struct DispatchPlan<T> {
    request_type: RequestType,
    handler_contract: Contract,
    behavior_contract: Contract,
    handler: Arc<dyn HandlerInvoker<T>>,
    behavior: Arc<dyn BehaviorInvoker<T>>,
}

impl<T> DispatchPlan<T> {
    pub(crate) fn new(compiled: CompiledInvokers<T>) -> Self {
        Self {
            request_type: compiled.request_type,
            handler_contract: compiled.handler_contract,
            behavior_contract: compiled.behavior_contract,
            handler: compiled.handler,
            behavior: compiled.behavior,
        }
    }

    /// Request and response types the plan dispatches
    pub fn request_type(&self) -> RequestType {
        self.request_type
    }

    /// Contract the handler is resolved under
    pub fn handler_contract(&self) -> &Contract {
        &self.handler_contract
    }

    /// Contract the behaviors are resolved under
    pub fn behavior_contract(&self) -> &Contract {
        &self.behavior_contract
    }

    pub(crate) fn handler(&self) -> &dyn HandlerInvoker<T> {
        self.handler.as_ref()
    }

    pub(crate) fn behavior(&self) -> &dyn BehaviorInvoker<T> {
        self.behavior.as_ref()
    }
}

impl<T> fmt::Debug for DispatchPlan<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchPlan")
            .field("request_type", &self.request_type)
            .field("handler_contract", &self.handler_contract)
            .field("behavior_contract", &self.behavior_contract)
            .finish_non_exhaustive()
    }
}

/// Snapshot of plan cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanCacheStats {
    /// Lookups answered by a published plan
    pub hits: u64,
    /// Lookups that had to build
    pub misses: u64,
    /// Builds that produced a plan, including builds that lost a publication race
    pub builds: u64,
    /// Builds that failed; nothing was cached for them
    pub failed_builds: u64,
    /// Plans currently published
    pub cached_plans: usize,
}

/// Process-wide map from request type to its dispatch plan. Never evicts.
pub struct PlanCache {
    plans: DashMap<PlanKey, Arc<dyn Any + Send + Sync>>,
    hits: AtomicU64,
    misses: AtomicU64,
    builds: AtomicU64,
    failed_builds: AtomicU64,
}

impl PlanCache {
    /// Cache sized from the default config
    pub fn new() -> Self {
        Self::with_config(&MediatorConfig::default())
    }

    /// Size the map from `config`. Shard amounts that are not a power of two
    /// greater than one fall back to the map's own default.
    pub fn with_config(config: &MediatorConfig) -> Self {
        let capacity = config.plan_cache_capacity;
        let plans = match config.plan_cache_shards {
            Some(shards) if shards > 1 && shards.is_power_of_two() => {
                DashMap::with_capacity_and_shard_amount(capacity, shards)
            }
            _ => DashMap::with_capacity(capacity),
        };
        Self {
            plans,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            builds: AtomicU64::new(0),
            failed_builds: AtomicU64::new(0),
        }
    }

    /// Return the published plan for `key`, building it with `build` on a miss.
    ///
    /// `build` runs outside any map lock. When two callers race, both may build and
    /// the first insert wins; the loser's plan is dropped. A failing `build` leaves
    /// the cache untouched so the next call builds again.
    pub fn get_or_build<T, F>(&self, key: PlanKey, build: F) -> MediateResult<Arc<DispatchPlan<T>>>
    where
        T: Send + 'static,
        F: FnOnce() -> MediateResult<DispatchPlan<T>>,
    {
        if let Some(plan) = self.get::<T>(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(request = key.0.name(), "dispatch plan cache hit");
            return Ok(plan);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let built = match build() {
            Ok(plan) => Arc::new(plan),
            Err(err) => {
                self.failed_builds.fetch_add(1, Ordering::Relaxed);
                return Err(err);
            }
        };
        self.builds.fetch_add(1, Ordering::Relaxed);

        let erased: Arc<dyn Any + Send + Sync> = built.clone();
        let retained = self.plans.entry(key).or_insert(erased).value().clone();
        tracing::debug!(
            request = key.0.name(),
            response = key.0.response().name(),
            "dispatch plan published"
        );
        // The key carries T's TypeId, so the retained plan always has our shape
        Ok(Arc::downcast::<DispatchPlan<T>>(retained).unwrap_or(built))
    }

    /// The published plan for `key`, if any
    pub fn get<T>(&self, key: &PlanKey) -> Option<Arc<DispatchPlan<T>>>
    where
        T: Send + 'static,
    {
        let plan = self.plans.get(key)?.value().clone();
        Arc::downcast::<DispatchPlan<T>>(plan).ok()
    }

    /// Whether a plan is published for `key`
    pub fn contains(&self, key: &PlanKey) -> bool {
        self.plans.contains_key(key)
    }

    /// Number of published plans
    pub fn len(&self) -> usize {
        self.plans.len()
    }

    /// True before the first plan is published
    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> PlanCacheStats {
        PlanCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            builds: self.builds.load(Ordering::Relaxed),
            failed_builds: self.failed_builds.load(Ordering::Relaxed),
            cached_plans: self.plans.len(),
        }
    }
}

impl Default for PlanCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PlanCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanCache")
            .field("stats", &self.stats())
            .finish()
    }
}
