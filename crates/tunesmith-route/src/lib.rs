//! Route guarding for Tunesmith.
//!
//! Decides, for a navigation target and the sessions of both realms,
//! whether the target is rendered, redirected to a login page, or deferred
//! until startup verification has finished.
//!
//! # Key types
//!
//! - [`RouteTable`]: declarative `{ path, requirement }` list with a
//!   default route for unknown paths
//! - [`RouteRequirement`]: public, or "signed in to realm X"
//! - [`RouteGuard`] / [`decide`]: the pure decision policy
//! - [`Sessions`]: both realms' states, borrowed for one decision
//!
//! Nothing here performs I/O or holds state; every function is a pure
//! mapping from inputs to a [`GuardDecision`].

mod error;
mod guard;
mod table;

pub use error::RouteError;
pub use guard::{GuardDecision, RouteGuard, Sessions, decide};
pub use table::{
    Navigation, RouteEntry, RouteRequirement, RouteSpec, RouteTable,
    RouteTableBuilder,
};
