//! Mediate Composition - dispatch engine
//!
//! Routes a request to its single handler through the ordered behaviors registered
//! for its concrete type.
//!
//! # Components
//!
//! - `plan`: per-type dispatch plans and the process-wide [`PlanCache`]
//! - `composer`: plan building and the per-call pipeline fold
//! - `mediator`: the [`Mediator`] entry points `send` and `send_with_response`
//! - `registry`: [`ServiceRegistry`], a reference scope resolver with lifetimes
//! - `behaviors`: tracing, validation and timeout behaviors
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use mediate_composition::prelude::*;
//!
//! struct Add { value: i32 }
//! impl Request<i32> for Add {}
//!
//! struct AddOne;
//!
//! #[async_trait]
//! impl RequestHandler<Add, i32> for AddOne {
//!     async fn handle(&self, request: &Add, _token: &CancelHandle) -> MediateResult<i32> {
//!         Ok(request.value + 1)
//!     }
//! }
//!
//! let registry = ServiceRegistry::builder()
//!     .add_handler::<Add, i32, _>(ServiceLifetime::Scoped, |_| Ok(AddOne))
//!     .build();
//! let mediator = Mediator::new(Arc::new(registry.clone()));
//!
//! let ctx = CallContext::new().with_scope(registry.create_scope());
//! let result = futures::executor::block_on(
//!     mediator.send_with_response::<i32>(&ctx, Some(share(Add { value: 5 }))),
//! );
//! assert_eq!(result.unwrap(), 6);
//! ```

#![forbid(unsafe_code)]

/// Standard behaviors
pub mod behaviors;

/// Plan building and pipeline folding
pub mod composer;

/// Dispatch entry points
pub mod mediator;

/// Dispatch plans and their cache
pub mod plan;

/// Curated re-exports
pub mod prelude;

/// Reference scope resolver
pub mod registry;

pub use composer::{build_plan, compose_pipeline};
pub use mediator::Mediator;
pub use plan::{DispatchPlan, PlanCache, PlanCacheStats, PlanKey};
pub use registry::{ScopedServices, ServiceLifetime, ServiceRegistry, ServiceRegistryBuilder};
