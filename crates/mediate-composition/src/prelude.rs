//! Mediate prelude.
//!
//! Curated re-exports for defining requests, handlers and behaviors and for wiring
//! a mediator.

pub use crate::behaviors::{
    TimeoutBehavior, TracingBehavior, ValidationBehavior, ValidationFailed, ValidationFailure,
    Validator,
};
pub use crate::mediator::Mediator;
pub use crate::registry::{ScopedServices, ServiceLifetime, ServiceRegistry};
pub use mediate_core::{
    share, CallContext, CancelHandle, CancellationSource, CancellationToken, MediateConfig,
    MediateError, MediateResult, MediatorConfig, MessageError, Next, PipelineBehavior, Request,
    RequestHandler, ServiceScope, ServiceScopeExt, SharedRequest,
};
