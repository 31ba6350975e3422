//! Per-realm session management for Tunesmith.
//!
//! This crate handles the lifecycle of a signed-in visitor, once per realm:
//!
//! 1. **Persistence**: keeping the bearer token across restarts
//!    ([`TokenStore`], [`FileTokenStore`], [`MemoryTokenStore`])
//! 2. **Verification**: asking the backend whether a persisted token is
//!    still good ([`SessionVerifier`])
//! 3. **Session tracking**: the state machine views observe and drive
//!    ([`SessionContext`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Shell / Route guard (above)  ← read SessionState, never write it
//!     ↕
//! Session Layer (this crate)   ← sole writer of token + identity, per realm
//!     ↕
//! Transport Layer (below)      ← AuthApi: login / profile / logout
//! ```
//!
//! The two realms get two fully independent [`SessionContext`]s. The only
//! thing they have in common is the [`TokenStore`], where each one owns a
//! separate entry.

mod context;
mod error;
mod session;
mod store;
mod verifier;

pub use context::{SessionContext, StartHandle, StartOutcome};
pub use error::{SessionError, StoreError};
pub use session::{SessionConfig, SessionPhase, SessionState};
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use verifier::SessionVerifier;
