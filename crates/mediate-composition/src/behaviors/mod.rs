//! Standard behaviors
//!
//! Ordinary [`PipelineBehavior`](mediate_core::PipelineBehavior) implementations,
//! registered per request type like any application behavior.

pub mod timeout;
pub mod tracing;
pub mod validation;

pub use self::timeout::{TimedOut, TimeoutBehavior};
pub use self::tracing::TracingBehavior;
pub use self::validation::{ValidationBehavior, ValidationFailed, ValidationFailure, Validator};
