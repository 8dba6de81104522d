//! Request model
//!
//! `Request` (no response) and `Request<T>` (typed response) are marker traits.
//! Dispatch is always keyed by the *concrete* type behind a `dyn Request<T>`: the
//! blanket [`DynRequest`] impl exposes that type's identity and its monomorphized
//! invokers through the trait object's vtable, so callers holding only an erased
//! request still reach the right handler.

use std::any::Any;
use std::sync::Arc;

use crate::contract::TypeTag;
use crate::invoker::{self, CompiledInvokers};

/// A request dispatched through the mediator.
///
/// `Request` (that is, `Request<()>`) is fire-and-forget; `Request<T>` produces a
/// `T`. Implementing the marker is all that is needed:
///
/// ```
/// use mediate_core::Request;
///
/// struct Add { value: i32 }
/// impl Request<i32> for Add {}
///
/// struct Audit;
/// impl Request for Audit {}
/// ```
pub trait Request<T = ()>: DynRequest<T>
where
    T: Send + 'static,
{
}

/// Object-safe view of a request, implemented for every concrete [`Request`].
///
/// Not meant to be implemented by hand.
pub trait DynRequest<T>: Any + Send + Sync
where
    T: Send + 'static,
{
    /// Identity of the concrete request type and its response type
    fn request_type(&self) -> RequestType;

    /// The request as `Any`, for downcasting back to the concrete type
    fn as_any(&self) -> &(dyn Any + Send + Sync);

    /// Build the call adapters for this request's concrete type
    fn compile_invokers(&self) -> CompiledInvokers<T>;
}

impl<R, T> DynRequest<T> for R
where
    R: Request<T>,
    T: Send + 'static,
{
    fn request_type(&self) -> RequestType {
        RequestType::of::<R, T>()
    }

    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn compile_invokers(&self) -> CompiledInvokers<T> {
        invoker::compile::<R, T>()
    }
}

/// Shared, type-erased request as accepted by the dispatcher
pub type SharedRequest<T = ()> = Arc<dyn Request<T>>;

/// Erase a concrete request for dispatch.
pub fn share<R, T>(request: R) -> SharedRequest<T>
where
    R: Request<T>,
    T: Send + 'static,
{
    Arc::new(request)
}

/// Whether a request produces a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestShape {
    /// `Request`: completion only
    FireAndForget,
    /// `Request<T>`: completion with a response value
    WithResponse,
}

/// Runtime identity of a concrete request type and its response type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestType {
    request: TypeTag,
    response: TypeTag,
}

impl RequestType {
    /// Identity of request `R` answering with `T`
    pub fn of<R: 'static, T: 'static>() -> Self {
        Self {
            request: TypeTag::of::<R>(),
            response: TypeTag::of::<T>(),
        }
    }

    /// The concrete request type
    pub fn request(&self) -> TypeTag {
        self.request
    }

    /// The response type; `()` when fire-and-forget
    pub fn response(&self) -> TypeTag {
        self.response
    }

    /// Short name of the concrete request type, used in log fields
    pub fn name(&self) -> &'static str {
        self.request.name()
    }

    /// Whether a value comes back
    pub fn shape(&self) -> RequestShape {
        if self.response == TypeTag::of::<()>() {
            RequestShape::FireAndForget
        } else {
            RequestShape::WithResponse
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Add {
        value: i32,
    }
    impl Request<i32> for Add {}

    struct Audit;
    impl Request for Audit {}

    #[test]
    fn erased_request_reports_concrete_type() {
        let request: SharedRequest<i32> = share(Add { value: 5 });
        let request_type = request.request_type();

        assert_eq!(request_type, RequestType::of::<Add, i32>());
        assert_eq!(request_type.shape(), RequestShape::WithResponse);
        assert!(request_type.name().ends_with("Add"));

        let concrete = request.as_any().downcast_ref::<Add>().map(|add| add.value);
        assert_eq!(concrete, Some(5));
    }

    #[test]
    fn unit_requests_are_fire_and_forget() {
        let request: SharedRequest = share(Audit);
        assert_eq!(request.request_type().shape(), RequestShape::FireAndForget);
    }
}
