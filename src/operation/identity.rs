//! Operation identity.
//!
//! The identity selects which circuit breaker an operation shares. It is
//! fixed when a builder is constructed, never at invocation time.

use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Token identifying a logical operation.
///
/// `CallSite` identities come from the source location that constructed a
/// builder; `Named` identities are supplied by the caller and used verbatim.
/// The two never compare equal, so an explicit name cannot alias a call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperationId {
    CallSite {
        file: &'static str,
        line: u32,
        column: u32,
    },
    Named(Arc<str>),
}

impl OperationId {
    /// Identity of the code that called the current (`#[track_caller]`) function.
    #[track_caller]
    pub fn caller() -> Self {
        Self::from_location(Location::caller())
    }

    pub fn from_location(location: &'static Location<'static>) -> Self {
        OperationId::CallSite {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }

    pub fn named(name: impl Into<Arc<str>>) -> Self {
        OperationId::Named(name.into())
    }

    pub fn is_call_site(&self) -> bool {
        matches!(self, OperationId::CallSite { .. })
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationId::CallSite { file, line, column } => write!(f, "{}:{}:{}", file, line, column),
            OperationId::Named(name) => f.write_str(name),
        }
    }
}

impl From<&str> for OperationId {
    fn from(name: &str) -> Self {
        OperationId::named(name)
    }
}

impl From<String> for OperationId {
    fn from(name: String) -> Self {
        OperationId::named(name)
    }
}
