//! The "who am I" check for a persisted token.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tunesmith_protocol::{Identity, Realm, Token};
use tunesmith_transport::{AuthApi, TransportError};

use crate::SessionError;

/// Confirms a token with the backend and fetches the identity behind it.
///
/// One verifier per realm. At most one verification runs at a time: a
/// second concurrent call fails fast with
/// [`SessionError::VerificationInFlight`] instead of queueing. Nothing is
/// retried; a failure is final for the token that was checked.
pub struct SessionVerifier<A: AuthApi> {
    realm: Realm,
    api: Arc<A>,
    in_flight: AtomicBool,
}

impl<A: AuthApi> SessionVerifier<A> {
    pub fn new(realm: Realm, api: Arc<A>) -> Self {
        Self {
            realm,
            api,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn realm(&self) -> Realm {
        self.realm
    }

    /// `true` while a verification is running.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Asks the backend who holds `token`.
    ///
    /// # Errors
    /// - [`SessionError::Unauthorized`]: the backend rejected the token
    ///   (401/403)
    /// - [`SessionError::Unreachable`]: no usable answer: transport
    ///   failure, timeout, 5xx, or an undecodable body
    /// - [`SessionError::VerificationInFlight`]: another verification for
    ///   this realm hasn't finished
    pub async fn verify(&self, token: &Token) -> Result<Identity, SessionError> {
        let _guard = InFlight::acquire(&self.in_flight)
            .ok_or(SessionError::VerificationInFlight(self.realm))?;

        tracing::debug!(realm = %self.realm, "verifying persisted token");

        self.api
            .profile(self.realm, token)
            .await
            .map_err(|e| classify(self.realm, e))
    }
}

/// Maps a transport failure onto the two outcomes a verification can have.
fn classify(realm: Realm, err: TransportError) -> SessionError {
    match err {
        TransportError::Unauthorized(message) => {
            tracing::info!(
                %realm,
                reason = message.as_deref().unwrap_or("none given"),
                "backend rejected persisted token"
            );
            SessionError::Unauthorized
        }
        other => SessionError::Unreachable(other.to_string()),
    }
}

/// Holds the in-flight flag; releases it on drop, including when the
/// verification future is dropped mid-await.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
