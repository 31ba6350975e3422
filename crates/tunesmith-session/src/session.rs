//! Session types: what a realm's session looks like from the outside.
//!
//! A [`SessionState`] is the snapshot views and the route guard read. It
//! is produced only by [`SessionContext`](crate::SessionContext), which
//! keeps the invariants below; everything outside this crate gets clones.
//!
//! - `identity.is_some()` implies `token.is_some()`
//! - `loading()` is true only before startup verification has resolved
//! - `is_authenticated()` is exactly `identity.is_some()`

use std::fmt;

use serde::{Deserialize, Serialize};
use tunesmith_protocol::{Identity, Realm, Token};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Whether a startup verification that fails because the backend is
    /// unreachable also deletes the persisted token.
    ///
    /// Default: `true`, i.e. any verification failure signs the visitor
    /// out for good. With `false` the session still starts signed out, but
    /// the token stays on disk and is re-verified on the next start.
    /// Tokens the backend explicitly rejects are always deleted.
    pub clear_token_on_unreachable: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            clear_token_on_unreachable: true,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionPhase
// ---------------------------------------------------------------------------

/// Where a realm's session is in its lifecycle.
///
/// ```text
///   Init ──(no token)──────────────────→ Unauthenticated ←─────────┐
///    │                                    │        ↑               │
///    └──(token)──→ Verifying ──(fail)─────┘        │ (fail)    (logout)
///                      │                  (login)  │               │
///                      │                     ↓     │               │
///                      │                  LoggingIn ──(ok)──→ Authenticated
///                      └───────────(ok)──────────────────────────→ ↑
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionPhase {
    /// Created, `start()` not called yet.
    Init,
    /// Checking a persisted token with the backend.
    Verifying,
    /// Signed out.
    Unauthenticated,
    /// A login request is in flight.
    LoggingIn,
    /// Signed in with a verified identity.
    Authenticated,
}

impl SessionPhase {
    /// `true` during the startup window, before the realm's state is known.
    ///
    /// A login in flight is a foreground action and does NOT count.
    pub fn is_loading(self) -> bool {
        matches!(self, Self::Init | Self::Verifying)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "init",
            Self::Verifying => "verifying",
            Self::Unauthenticated => "unauthenticated",
            Self::LoggingIn => "logging-in",
            Self::Authenticated => "authenticated",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// A snapshot of one realm's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    realm: Realm,
    pub(crate) phase: SessionPhase,
    pub(crate) token: Option<Token>,
    pub(crate) identity: Option<Identity>,
}

impl SessionState {
    /// The state of a freshly created session: loading, nothing known.
    pub fn initial(realm: Realm) -> Self {
        Self {
            realm,
            phase: SessionPhase::Init,
            token: None,
            identity: None,
        }
    }

    /// A signed-out session.
    pub fn anonymous(realm: Realm) -> Self {
        Self {
            phase: SessionPhase::Unauthenticated,
            ..Self::initial(realm)
        }
    }

    /// A signed-in session.
    pub fn signed_in(realm: Realm, token: Token, identity: Identity) -> Self {
        Self {
            realm,
            phase: SessionPhase::Authenticated,
            token: Some(token),
            identity: Some(identity),
        }
    }

    pub fn realm(&self) -> Realm {
        self.realm
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// See [`SessionPhase::is_loading`].
    pub fn loading(&self) -> bool {
        self.phase.is_loading()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// Drops token and identity together and marks the session signed out.
    pub(crate) fn clear(&mut self) {
        self.phase = SessionPhase::Unauthenticated;
        self.token = None;
        self.identity = None;
    }
}
