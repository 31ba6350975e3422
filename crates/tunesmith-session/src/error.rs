//! Error types for the session layer.

use std::path::PathBuf;

use tunesmith_protocol::Realm;

use crate::SessionPhase;

/// Errors that can occur during session management.
///
/// Only some of these ever reach a view: startup verification failures
/// are swallowed by [`SessionContext`](crate::SessionContext) and simply
/// leave the realm signed out. Login failures are returned to the caller
/// so the form can show [`SessionError::user_message`].
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The backend refused the credentials. Carries the text to show.
    #[error("{0}")]
    LoginRejected(String),

    /// The backend could not be reached (or answered garbage).
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The backend no longer accepts the token (expired or revoked).
    #[error("session token rejected by the backend")]
    Unauthorized,

    /// The best-effort logout call failed. Local state is already
    /// cleared; this is only ever logged.
    #[error("logout notification failed: {0}")]
    LogoutNotifyFailed(String),

    /// A second verification was attempted while one was running.
    #[error("a {0} verification is already in flight")]
    VerificationInFlight(Realm),

    /// Credentials of one realm were handed to the other realm's session.
    #[error("{got} credentials passed to the {expected} session")]
    RealmMismatch { expected: Realm, got: Realm },

    /// The session is starting up or already logging in.
    #[error("{realm} session is busy ({phase})")]
    Busy { realm: Realm, phase: SessionPhase },

    /// `login` was called while already signed in.
    #[error("{0} session is already authenticated")]
    AlreadyAuthenticated(Realm),

    /// The session changed (logout, teardown) while the request was in
    /// flight, so its result was thrown away.
    #[error("{0} session changed while the request was in flight")]
    Superseded(Realm),

    /// The token store failed.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl SessionError {
    /// Text suitable for showing next to a login form.
    pub fn user_message(&self, realm: Realm) -> String {
        match self {
            Self::LoginRejected(message) => message.clone(),
            Self::Unreachable(_) => {
                "Unable to reach the server. Please try again later.".into()
            }
            Self::AlreadyAuthenticated(_) => "You are already signed in.".into(),
            Self::Busy { .. } => "Please wait, signing in is in progress.".into(),
            _ => realm.login_failed_message().into(),
        }
    }
}

/// Errors from a [`TokenStore`](crate::TokenStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read {realm} token from {}: {source}", path.display())]
    Read {
        realm: Realm,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {realm} token to {}: {source}", path.display())]
    Write {
        realm: Realm,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove {realm} token at {}: {source}", path.display())]
    Remove {
        realm: Realm,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
