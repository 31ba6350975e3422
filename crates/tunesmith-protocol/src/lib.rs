//! Shared vocabulary for the Tunesmith client core.
//!
//! This crate defines the types every other layer speaks in:
//!
//! - **Types** ([`Realm`], [`Token`], [`Identity`], [`Credentials`]):
//!   who is signing in, with what, and what the backend says about them.
//! - **Wire bodies** ([`LoginResponse`], [`ProfileResponse`], [`ErrorBody`]):
//!   the JSON shapes exchanged with the backend's auth endpoints.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those bodies are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while doing so.
//!
//! # Architecture
//!
//! The protocol layer knows nothing about HTTP, storage or state machines.
//! It only describes data.
//!
//! ```text
//! Transport (HTTP) → Protocol (bodies) → Session (per-realm state)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Credentials, ErrorBody, Identity, LoginResponse, ProfileResponse, Realm,
    Token,
};
