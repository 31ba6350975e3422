//! Backend abstraction layer for Tunesmith.
//!
//! Provides the [`AuthApi`] trait that abstracts over how the client core
//! reaches the backend's auth endpoints. Each realm has the same three
//! endpoints under its own prefix:
//!
//! ```text
//! POST <realm>/login    credentials      → { token, identity }
//! GET  <realm>/profile  bearer token     → { identity }
//! POST <realm>/logout   bearer token     → ignored
//! ```
//!
//! # Feature Flags
//!
//! - `http` (default): HTTP implementation via `reqwest`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "http")]
mod http;

pub use error::TransportError;
#[cfg(feature = "http")]
pub use http::{HttpAuthApi, HttpConfig};

use std::future::Future;

use tunesmith_protocol::{Credentials, Identity, LoginResponse, Realm, Token};

/// The backend's auth contract, per realm.
///
/// Implemented by [`HttpAuthApi`] in production and by scripted fakes in
/// tests. The session layer is generic over this trait and never sees
/// HTTP types.
pub trait AuthApi: Send + Sync + 'static {
    /// Exchanges credentials for a token and identity.
    fn login(
        &self,
        realm: Realm,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<LoginResponse, TransportError>> + Send;

    /// Asks the backend who the bearer of `token` is.
    fn profile(
        &self,
        realm: Realm,
        token: &Token,
    ) -> impl Future<Output = Result<Identity, TransportError>> + Send;

    /// Tells the backend the token is no longer in use.
    fn logout(
        &self,
        realm: Realm,
        token: &Token,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}
