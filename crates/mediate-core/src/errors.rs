//! Unified error system for the mediator
//!
//! Dispatcher-originated failures (absent request, missing or ambiguous handler) are
//! distinct variants. Failures raised inside handlers and behaviors travel through the
//! pipeline as boxed sources that the caller can downcast back to the original value.

use crate::contract::Contract;

/// Boxed error used for handler and behavior failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Unified error type for all mediator operations
#[derive(Debug, thiserror::Error)]
pub enum MediateError {
    /// The request was absent or otherwise unusable; nothing was invoked
    #[error("Invalid argument '{argument}': {message}")]
    InvalidArgument {
        /// Name of the offending argument
        argument: &'static str,
        /// Error message describing the problem
        message: String,
    },

    /// No implementation registered for a contract that requires exactly one
    #[error("No handler registered for {contract}")]
    HandlerNotFound {
        /// Contract that failed to resolve
        contract: Contract,
    },

    /// More than one implementation registered for a contract that requires exactly one
    #[error("Ambiguous handler for {contract}: {count} implementations registered")]
    AmbiguousHandler {
        /// Contract that failed to resolve
        contract: Contract,
        /// Number of registrations found
        count: usize,
    },

    /// A handler failed; the source is the handler's own error value
    #[error(transparent)]
    Handler(BoxError),

    /// A behavior failed; the source is the behavior's own error value
    #[error(transparent)]
    Behavior(BoxError),

    /// A resolved instance did not have the shape its contract promised
    #[error("Instance resolved for {contract} is not a {expected}")]
    ContractMismatch {
        /// Contract being resolved
        contract: Contract,
        /// Type name the adapter expected
        expected: &'static str,
    },

    /// A registered factory failed to produce an instance
    #[error("Failed to construct instance for {contract}")]
    Construction {
        /// Contract being constructed
        contract: Contract,
        /// The factory's own failure
        #[source]
        source: BoxError,
    },
}

impl MediateError {
    /// Create an invalid argument error
    pub fn invalid_argument(argument: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument,
            message: message.into(),
        }
    }

    /// Wrap a failure raised by a handler
    pub fn handler(source: impl Into<BoxError>) -> Self {
        Self::Handler(source.into())
    }

    /// Wrap a failure raised by a behavior
    pub fn behavior(source: impl Into<BoxError>) -> Self {
        Self::Behavior(source.into())
    }

    /// Create a construction error for a failed factory
    pub fn construction(contract: Contract, source: impl Into<BoxError>) -> Self {
        Self::Construction {
            contract,
            source: source.into(),
        }
    }

    /// Borrow the original handler or behavior failure as `E`, if that is what it was.
    ///
    /// Returns `None` for dispatcher-originated errors.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            Self::Handler(source) | Self::Behavior(source) => source.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// True for failures that originate in the dispatcher rather than the pipeline
    pub fn is_dispatch_error(&self) -> bool {
        !matches!(self, Self::Handler(_) | Self::Behavior(_))
    }
}

/// Standard Result type for mediator operations
pub type MediateResult<T> = std::result::Result<T, MediateError>;

/// An inner failure annotated with a user-facing message.
///
/// Handlers return this when the caller should see a curated message while the
/// underlying cause stays available through [`std::error::Error::source`].
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct MessageError {
    message: String,
    #[source]
    source: BoxError,
}

impl MessageError {
    /// Wrap `source` with `message`
    pub fn new(source: impl Into<BoxError>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: source.into(),
        }
    }

    /// The user-facing message
    pub fn message(&self) -> &str {
        &self.message
    }
}
