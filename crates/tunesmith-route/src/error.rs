//! Error types for the route layer.

/// Errors raised while building a [`RouteTable`](crate::RouteTable).
///
/// Decisions themselves never fail; only a malformed table does.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RouteError {
    /// Patterns are absolute: they must start with `/`.
    #[error("route pattern {0:?} must start with '/'")]
    NotAbsolute(String),

    /// A `:` segment without a parameter name, e.g. `/tracks/:`.
    #[error("route pattern {0:?} has an unnamed parameter")]
    UnnamedParam(String),

    /// The same pattern was declared twice.
    #[error("route pattern {0:?} is declared more than once")]
    Duplicate(String),

    /// The default route is not one of the declared routes.
    #[error("default route {0:?} is not declared in the table")]
    UnknownDefault(String),

    /// The default route must be reachable without signing in, or an
    /// unknown path could redirect forever.
    #[error("default route {0:?} must be public")]
    ProtectedDefault(String),
}
