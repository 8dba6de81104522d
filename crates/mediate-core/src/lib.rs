//! Mediate Core - request mediator contracts
//!
//! Types and traits shared by the dispatch engine and by application code that
//! defines requests, handlers and behaviors. This crate holds no runtime state.
//!
//! # Layers
//!
//! ## Request model
//! - `Request`: fire-and-forget, `Request<T>`: typed response
//! - `DynRequest`: object-safe view reaching the concrete type behind a `dyn Request<T>`
//!
//! ## Pipeline contracts
//! - `RequestHandler<R, T>`: exactly one per request type
//! - `PipelineBehavior<R, T>`: zero or more, outermost first
//! - `Next`: continuation into the rest of the pipeline
//!
//! ## Resolution
//! - `ServiceScope`: per-call instance resolution supplied by the host
//! - `invoker::compile`: monomorphized adapters calling handlers and behaviors
//!
//! ## Ambient
//! - `CallContext`, `CancellationToken`: explicit per-call state
//! - `MediateError`: unified error handling
//! - `MediatorConfig`: TOML and environment driven settings

#![forbid(unsafe_code)]

/// Cooperative cancellation tokens
pub mod cancel;

/// Mediator configuration and validation
pub mod config;

/// Per-call context
pub mod context;

/// Contract identities
pub mod contract;

/// Unified error handling
pub mod errors;

/// Handler and behavior traits
pub mod handler;

/// Type-erased call adapters
pub mod invoker;

/// Request marker traits
pub mod request;

/// Scope resolver boundary
pub mod scope;

pub use cancel::{CancelHandle, CancellationSource, CancellationToken, NeverCancel};
pub use config::{ConfigError, MediateConfig, MediatorConfig};
pub use context::CallContext;
pub use contract::{Contract, ContractKind, TypeTag};
pub use errors::{BoxError, MediateError, MediateResult, MessageError};
pub use handler::{Next, PipelineBehavior, PipelineFuture, RequestHandler};
pub use invoker::{BehaviorInvoker, CompiledInvokers, HandlerInvoker};
pub use request::{share, DynRequest, Request, RequestShape, RequestType, SharedRequest};
pub use scope::{downcast_instance, ServiceInstance, ServiceScope, ServiceScopeExt};
