//! Per-call context handed to the mediator.

use std::fmt;
use std::sync::Arc;

use crate::cancel::{CancelHandle, NeverCancel};
use crate::scope::ServiceScope;

/// Explicit per-call context: the scope tied to the inbound call, if any, and the
/// cancellation token threaded to every stage.
#[derive(Clone)]
pub struct CallContext {
    scope: Option<Arc<dyn ServiceScope>>,
    token: CancelHandle,
}

impl CallContext {
    /// Context with no call scope and a token that never fires
    pub fn new() -> Self {
        Self {
            scope: None,
            token: NeverCancel::handle(),
        }
    }

    /// Use `scope` instead of the mediator's root scope
    pub fn with_scope(mut self, scope: Arc<dyn ServiceScope>) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Thread `token` to every stage of the call
    pub fn with_token(mut self, token: CancelHandle) -> Self {
        self.token = token;
        self
    }

    /// The call scope, if one was attached
    pub fn scope(&self) -> Option<&Arc<dyn ServiceScope>> {
        self.scope.as_ref()
    }

    /// The cancellation token of the call
    pub fn token(&self) -> &CancelHandle {
        &self.token
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("scoped", &self.scope.is_some())
            .field("token", &self.token)
            .finish()
    }
}
