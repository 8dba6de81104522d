//! Validation behavior
//!
//! Runs every [`Validator`] registered for the request before the handler and
//! short-circuits with [`ValidationFailed`] when any of them reports a problem.

use async_trait::async_trait;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use mediate_core::{
    CancelHandle, MediateError, MediateResult, Next, PipelineBehavior, Request, RequestType,
    ServiceScope, ServiceScopeExt,
};

/// One problem found in a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    /// Offending field of the request
    pub field: String,
    /// What is wrong with it
    pub message: String,
}

impl ValidationFailure {
    /// Failure on `field`
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Checks a request before it reaches its handler.
///
/// Register implementations as services of `dyn Validator<R>`.
pub trait Validator<R>: Send + Sync {
    /// Every problem with `request`; empty when it is valid
    fn validate(&self, request: &R) -> Vec<ValidationFailure>;
}

/// All failures reported by the validators of one request
#[derive(Debug, Clone, thiserror::Error)]
#[error("Validation failed for {request}: {}", render(.failures))]
pub struct ValidationFailed {
    request: &'static str,
    failures: Vec<ValidationFailure>,
}

impl ValidationFailed {
    /// Name of the rejected request type
    pub fn request(&self) -> &'static str {
        self.request
    }

    /// Every failure, in validator order
    pub fn failures(&self) -> &[ValidationFailure] {
        &self.failures
    }
}

fn render(failures: &[ValidationFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Behavior running the validators registered for `R`
pub struct ValidationBehavior<R> {
    validators: Vec<Arc<dyn Validator<R>>>,
    _request: PhantomData<fn(&R)>,
}

impl<R: 'static> ValidationBehavior<R> {
    /// Behavior running `validators` in order
    pub fn new(validators: Vec<Arc<dyn Validator<R>>>) -> Self {
        Self {
            validators,
            _request: PhantomData,
        }
    }

    /// Factory resolving every `dyn Validator<R>` from `scope`
    pub fn resolve(scope: &dyn ServiceScope) -> MediateResult<Self> {
        Ok(Self::new(scope.resolve_services::<dyn Validator<R>>()?))
    }
}

impl<R> fmt::Debug for ValidationBehavior<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationBehavior")
            .field("validators", &self.validators.len())
            .finish()
    }
}

#[async_trait]
impl<R, T> PipelineBehavior<R, T> for ValidationBehavior<R>
where
    R: Request<T>,
    T: Send + 'static,
{
    async fn handle(&self, request: &R, next: Next<'_, T>, _token: &CancelHandle) -> MediateResult<T> {
        let failures: Vec<ValidationFailure> = self
            .validators
            .iter()
            .flat_map(|validator| validator.validate(request))
            .collect();

        if failures.is_empty() {
            return next.run().await;
        }

        let request_type = RequestType::of::<R, T>();
        tracing::debug!(
            request = request_type.name(),
            failures = failures.len(),
            "request rejected by validation"
        );
        Err(MediateError::behavior(ValidationFailed {
            request: request_type.name(),
            failures,
        }))
    }
}
