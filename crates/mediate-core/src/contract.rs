//! Contract identities used to look up implementations in a scope
//!
//! A contract names *what* is being resolved (a handler, a behavior or a plain
//! service) for a specific pair of concrete types. Identity is the kind plus the
//! `TypeId`s; type names are carried only for diagnostics.

use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// What a contract resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
    /// `RequestHandler<R, T>`: exactly one implementation expected
    Handler,
    /// `PipelineBehavior<R, T>`: zero or more, ordered outermost-first
    Behavior,
    /// Any other dependency a factory may resolve (validators, sessions, ...)
    Service,
}

impl fmt::Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractKind::Handler => write!(f, "handler"),
            ContractKind::Behavior => write!(f, "behavior"),
            ContractKind::Service => write!(f, "service"),
        }
    }
}

/// Runtime identity of a Rust type
#[derive(Debug, Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    /// Tag for `T`
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    /// The `TypeId`
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The type name, for diagnostics only
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Identity of something resolvable from a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Contract {
    kind: ContractKind,
    subject: TypeTag,
    response: TypeTag,
}

impl Contract {
    /// Handler contract for request `R` answering with `T`
    pub fn handler<R: 'static, T: 'static>() -> Self {
        Self {
            kind: ContractKind::Handler,
            subject: TypeTag::of::<R>(),
            response: TypeTag::of::<T>(),
        }
    }

    /// Behavior contract for request `R` answering with `T`
    pub fn behavior<R: 'static, T: 'static>() -> Self {
        Self {
            kind: ContractKind::Behavior,
            subject: TypeTag::of::<R>(),
            response: TypeTag::of::<T>(),
        }
    }

    /// Contract for an arbitrary shared service `S`
    pub fn service<S: ?Sized + 'static>() -> Self {
        Self {
            kind: ContractKind::Service,
            subject: TypeTag::of::<S>(),
            response: TypeTag::of::<()>(),
        }
    }

    /// Kind of contract
    pub fn kind(&self) -> ContractKind {
        self.kind
    }

    /// The request type (or service type for [`ContractKind::Service`])
    pub fn subject(&self) -> TypeTag {
        self.subject
    }

    /// The response type; `()` for fire-and-forget requests and services
    pub fn response(&self) -> TypeTag {
        self.response
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ContractKind::Service => write!(f, "service<{}>", self.subject),
            kind => write!(f, "{}<{}, {}>", kind, self.subject, self.response),
        }
    }
}
