//! The session context: one realm's session state machine.
//!
//! This is the only writer of a realm's token and identity, both in memory
//! and in the [`TokenStore`]. Views read snapshots or subscribe to changes;
//! they change the session only through [`SessionContext::login`] and
//! [`SessionContext::logout`].
//!
//! # Stale responses
//!
//! Verification and login suspend on the network. While they do, the
//! session may move on (a logout, a teardown). Every suspended operation
//! therefore takes a ticket when it is issued: the context's epoch plus
//! the token it expects to find. The result is applied only if both still
//! match at apply-time; otherwise it is dropped. Every transition bumps the
//! epoch, so a superseded result can never overwrite newer state.
//!
//! # Concurrency note
//!
//! State lives in a `tokio::sync::watch` channel. Writes happen inside
//! `send_if_modified`, which also performs the matching [`TokenStore`]
//! write, so memory and disk change under the same lock. No lock is held
//! across an `.await`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tunesmith_protocol::{Credentials, Identity, LoginResponse, Realm, Token};
use tunesmith_transport::{AuthApi, TransportError};

use crate::{
    SessionConfig, SessionError, SessionPhase, SessionState, SessionVerifier,
    TokenStore,
};

/// One realm's session.
///
/// Cheap to clone: clones share the same underlying session. Construct one
/// per realm at bootstrap and hand clones to whatever needs them.
///
/// ## Lifecycle
///
/// ```text
/// new() ──→ start() ──→ [Verifying] ──→ Authenticated / Unauthenticated
///                                              │            │
///                                         logout()      login()
/// ```
pub struct SessionContext<A: AuthApi> {
    inner: Arc<Inner<A>>,
}

struct Inner<A: AuthApi> {
    realm: Realm,
    api: Arc<A>,
    verifier: SessionVerifier<A>,
    store: Arc<dyn TokenStore>,
    config: SessionConfig,
    state: watch::Sender<SessionState>,
    epoch: AtomicU64,
    started: AtomicBool,
}

/// What a suspended operation expects to find when it resumes.
#[derive(Debug, Clone)]
struct Ticket {
    epoch: u64,
    token: Option<Token>,
}

impl<A: AuthApi> Clone for SessionContext<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: AuthApi> SessionContext<A> {
    /// Creates the session for `realm`, in [`SessionPhase::Init`].
    ///
    /// Nothing is read or sent until [`start`](Self::start) is called.
    pub fn new(
        realm: Realm,
        api: Arc<A>,
        store: Arc<dyn TokenStore>,
        config: SessionConfig,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::initial(realm));
        Self {
            inner: Arc::new(Inner {
                realm,
                verifier: SessionVerifier::new(realm, Arc::clone(&api)),
                api,
                store,
                config,
                state,
                epoch: AtomicU64::new(0),
                started: AtomicBool::new(false),
            }),
        }
    }

    pub fn realm(&self) -> Realm {
        self.inner.realm
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// A receiver that is notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.state.borrow().phase()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.state.borrow().identity().cloned()
    }

    pub fn loading(&self) -> bool {
        self.inner.state.borrow().loading()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    // =====================================================================
    // start
    // =====================================================================

    /// Resolves the startup state. Call once per realm at bootstrap.
    ///
    /// Without a persisted token the session becomes `Unauthenticated`
    /// right here, with no network call. With one, the session enters
    /// `Verifying` and a task checks the token with the backend; use the
    /// returned [`StartHandle`] to await it or to tear it down.
    ///
    /// Verification failures never surface: they leave the realm signed
    /// out, just like an expired session would.
    pub fn start(&self) -> StartHandle {
        let realm = self.inner.realm;

        if self.inner.started.swap(true, Ordering::AcqRel) {
            tracing::warn!(%realm, "session already started, ignoring");
            return StartHandle::ready(realm, StartOutcome::AlreadyStarted);
        }

        let persisted = match self.inner.store.get(realm) {
            Ok(token) => token.filter(|t| !t.is_blank()),
            Err(e) => {
                tracing::warn!(%realm, error = %e, "could not read persisted token");
                None
            }
        };

        let Some(token) = persisted else {
            self.inner.state.send_if_modified(|state| {
                if state.phase != SessionPhase::Init {
                    return false;
                }
                state.clear();
                true
            });
            tracing::info!(%realm, "no persisted token, starting signed out");
            return StartHandle::ready(realm, StartOutcome::NoToken);
        };

        let mut ticket = None;
        self.inner.state.send_if_modified(|state| {
            if state.phase != SessionPhase::Init {
                return false;
            }
            state.phase = SessionPhase::Verifying;
            state.token = Some(token.clone());
            state.identity = None;
            ticket = Some(self.inner.issue(Some(token.clone())));
            true
        });

        let Some(ticket) = ticket else {
            // Someone logged out before start(); nothing to restore.
            return StartHandle::ready(realm, StartOutcome::Discarded);
        };

        let ctx = self.clone();
        let startup = ticket.clone();
        let task = tokio::spawn(async move { ctx.verify_persisted(ticket, token).await });
        StartHandle {
            realm,
            run: Run::Pending(task),
            verification: Some((Arc::clone(&self.inner) as Arc<dyn AbandonStart>, startup)),
        }
    }

    async fn verify_persisted(self, ticket: Ticket, token: Token) -> StartOutcome {
        let realm = self.inner.realm;

        match self.inner.verifier.verify(&token).await {
            Ok(identity) => {
                let handle = identity.handle.clone();
                let applied = self.inner.apply_if_current(&ticket, |state| {
                    state.phase = SessionPhase::Authenticated;
                    state.identity = Some(identity);
                });
                if applied {
                    tracing::info!(%realm, %handle, "session restored");
                    StartOutcome::Verified
                } else {
                    tracing::debug!(%realm, "verification result superseded, discarded");
                    StartOutcome::Discarded
                }
            }
            Err(err) => {
                let keep_token = matches!(err, SessionError::Unreachable(_))
                    && !self.inner.config.clear_token_on_unreachable;
                let store = &self.inner.store;

                let applied = self.inner.apply_if_current(&ticket, |state| {
                    state.clear();
                    if !keep_token {
                        if let Err(e) = store.clear(realm) {
                            tracing::warn!(%realm, error = %e, "could not remove rejected token");
                        }
                    }
                });
                if !applied {
                    tracing::debug!(%realm, "verification failure superseded, discarded");
                    return StartOutcome::Discarded;
                }

                tracing::warn!(%realm, error = %err, keep_token, "persisted session not restored");
                match err {
                    SessionError::Unauthorized => StartOutcome::Rejected,
                    _ => StartOutcome::Unreachable,
                }
            }
        }
    }

    // =====================================================================
    // login
    // =====================================================================

    /// Signs in with `credentials`.
    ///
    /// Only valid while `Unauthenticated`. On success the token is
    /// persisted and token + identity are set together. On failure the
    /// state is exactly what it was before the call.
    ///
    /// # Errors
    /// - [`SessionError::LoginRejected`]: bad credentials, carries the
    ///   server's message or the realm's generic one
    /// - [`SessionError::Unreachable`]: the backend couldn't be reached
    /// - [`SessionError::RealmMismatch`]: credentials of the other realm
    /// - [`SessionError::Busy`] / [`SessionError::AlreadyAuthenticated`]:
    ///   wrong phase for a login
    /// - [`SessionError::Superseded`]: the session changed (e.g. logout)
    ///   while the request was in flight; the result was dropped
    pub async fn login(&self, credentials: Credentials) -> Result<Identity, SessionError> {
        let realm = self.inner.realm;
        if credentials.realm() != realm {
            return Err(SessionError::RealmMismatch {
                expected: realm,
                got: credentials.realm(),
            });
        }

        let mut admitted = Err(SessionError::Superseded(realm));
        self.inner.state.send_if_modified(|state| match state.phase {
            SessionPhase::Unauthenticated => {
                state.phase = SessionPhase::LoggingIn;
                admitted = Ok(self.inner.issue(None));
                true
            }
            SessionPhase::Authenticated => {
                admitted = Err(SessionError::AlreadyAuthenticated(realm));
                false
            }
            phase => {
                admitted = Err(SessionError::Busy { realm, phase });
                false
            }
        });
        let ticket = admitted?;

        tracing::info!(%realm, principal = credentials.principal(), "login started");
        let mut pending = PendingLogin {
            inner: &*self.inner,
            ticket: Some(ticket.clone()),
        };

        let result = self.inner.api.login(realm, &credentials).await;
        pending.disarm();

        match result {
            Ok(LoginResponse { token, identity }) => {
                let store = &self.inner.store;
                let applied = self.inner.apply_if_current(&ticket, |state| {
                    if let Err(e) = store.set(realm, &token) {
                        tracing::warn!(%realm, error = %e, "could not persist token");
                    }
                    state.phase = SessionPhase::Authenticated;
                    state.token = Some(token);
                    state.identity = Some(identity.clone());
                });
                if applied {
                    tracing::info!(%realm, handle = %identity.handle, "login succeeded");
                    Ok(identity)
                } else {
                    self.inner.release_login(&ticket);
                    tracing::debug!(%realm, "login response superseded, discarded");
                    Err(SessionError::Superseded(realm))
                }
            }
            Err(e) => {
                let err = login_error(realm, e);
                self.inner.release_login(&ticket);
                tracing::warn!(%realm, error = %err, "login failed");
                Err(err)
            }
        }
    }

    // =====================================================================
    // logout
    // =====================================================================

    /// Signs out, locally and immediately.
    ///
    /// Token and identity are cleared (memory and store) before this
    /// returns, whatever phase the session was in, and anything still in
    /// flight is made inert. The backend is then told in the background;
    /// that call's outcome is only logged and never restores the session.
    pub fn logout(&self) {
        let realm = self.inner.realm;
        let store = &self.inner.store;
        let mut previous = None;

        self.inner.state.send_if_modified(|state| {
            self.inner.issue(None);
            if let Err(e) = store.clear(realm) {
                tracing::warn!(%realm, error = %e, "could not remove persisted token");
            }
            let changed = state.phase != SessionPhase::Unauthenticated;
            previous = state.token.take();
            state.clear();
            changed || previous.is_some()
        });

        tracing::info!(%realm, "logged out");

        if let Some(token) = previous {
            self.notify_logout(token);
        }
    }

    fn notify_logout(&self, token: Token) {
        let realm = self.inner.realm;
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(%realm, "no async runtime, skipping logout notification");
            return;
        };

        let api = Arc::clone(&self.inner.api);
        runtime.spawn(async move {
            match api.logout(realm, &token).await {
                Ok(()) => tracing::debug!(%realm, "backend acknowledged logout"),
                Err(e) => {
                    let err = SessionError::LogoutNotifyFailed(e.to_string());
                    tracing::warn!(%realm, error = %err, "ignoring logout failure");
                }
            }
        });
    }
}

impl<A: AuthApi> Inner<A> {
    /// Starts a new epoch and returns the ticket for it.
    fn issue(&self, token: Option<Token>) -> Ticket {
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        Ticket { epoch, token }
    }

    /// Runs `apply` on the state only if `ticket` is still current.
    fn apply_if_current(
        &self,
        ticket: &Ticket,
        apply: impl FnOnce(&mut SessionState),
    ) -> bool {
        self.state.send_if_modified(|state| {
            let current = self.epoch.load(Ordering::Acquire) == ticket.epoch
                && state.token == ticket.token;
            if current {
                apply(state);
            }
            current
        })
    }

    /// Returns a `LoggingIn` session to `Unauthenticated` when the login
    /// that `ticket` admitted ends without signing in. A later login's
    /// `LoggingIn` is left alone.
    fn release_login(&self, ticket: &Ticket) -> bool {
        self.state.send_if_modified(|state| {
            let ours = self.epoch.load(Ordering::Acquire) == ticket.epoch
                && state.phase == SessionPhase::LoggingIn;
            if ours {
                state.phase = SessionPhase::Unauthenticated;
            }
            ours
        })
    }
}

/// What a [`StartHandle`] needs from its session to abandon startup,
/// without carrying the session's `AuthApi` type.
trait AbandonStart: Send + Sync {
    /// Moves a session still verifying under `ticket` to
    /// `Unauthenticated`. The persisted token is kept for the next start.
    fn abandon(&self, ticket: &Ticket) -> bool;
}

impl<A: AuthApi> AbandonStart for Inner<A> {
    fn abandon(&self, ticket: &Ticket) -> bool {
        self.state.send_if_modified(|state| {
            let verifying = self.epoch.load(Ordering::Acquire) == ticket.epoch
                && state.token == ticket.token
                && state.phase == SessionPhase::Verifying;
            if verifying {
                state.clear();
            }
            verifying
        })
    }
}

/// Maps a failed login request to what the caller sees.
fn login_error(realm: Realm, err: TransportError) -> SessionError {
    match err {
        TransportError::Unreachable(detail) | TransportError::Config(detail) => {
            SessionError::Unreachable(detail)
        }
        TransportError::Unauthorized(message) | TransportError::Status { message, .. } => {
            SessionError::LoginRejected(
                message.unwrap_or_else(|| realm.login_failed_message().to_string()),
            )
        }
        TransportError::Protocol(e) => {
            tracing::warn!(%realm, error = %e, "login response violated the contract");
            SessionError::LoginRejected(realm.login_failed_message().to_string())
        }
    }
}

/// Puts a `LoggingIn` session back to `Unauthenticated` if the `login`
/// future is dropped before the response arrives.
struct PendingLogin<'a, A: AuthApi> {
    inner: &'a Inner<A>,
    ticket: Option<Ticket>,
}

impl<A: AuthApi> PendingLogin<'_, A> {
    fn disarm(&mut self) {
        self.ticket = None;
    }
}

impl<A: AuthApi> Drop for PendingLogin<'_, A> {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            let realm = self.inner.realm;
            self.inner.release_login(&ticket);
            tracing::debug!(%realm, "login cancelled by caller");
        }
    }
}

// ---------------------------------------------------------------------------
// StartHandle
// ---------------------------------------------------------------------------

/// How a realm's startup resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Nothing was persisted; no network call was made.
    NoToken,
    /// The persisted token was accepted; the session is authenticated.
    Verified,
    /// The backend rejected the token; it was removed.
    Rejected,
    /// The backend could not be reached; the session starts signed out.
    Unreachable,
    /// The session moved on (logout, teardown) before the result arrived.
    Discarded,
    /// `start()` had already been called for this realm.
    AlreadyStarted,
}

/// Returned by [`SessionContext::start`].
///
/// Dropping the handle does not cancel verification; it keeps running and
/// still updates the session. Call [`teardown`](Self::teardown) to make
/// its result inert.
pub struct StartHandle {
    realm: Realm,
    run: Run,
    verification: Option<(Arc<dyn AbandonStart>, Ticket)>,
}

enum Run {
    Ready(StartOutcome),
    Pending(JoinHandle<StartOutcome>),
}

impl StartHandle {
    fn ready(realm: Realm, outcome: StartOutcome) -> Self {
        Self {
            realm,
            run: Run::Ready(outcome),
            verification: None,
        }
    }

    pub fn realm(&self) -> Realm {
        self.realm
    }

    /// `true` once the startup outcome is known.
    pub fn is_finished(&self) -> bool {
        match &self.run {
            Run::Ready(_) => true,
            Run::Pending(task) => task.is_finished(),
        }
    }

    /// Waits for startup to resolve.
    pub async fn wait(self) -> StartOutcome {
        match self.run {
            Run::Ready(outcome) => outcome,
            Run::Pending(task) => task.await.unwrap_or(StartOutcome::Discarded),
        }
    }

    /// Abandons startup: whatever the verification returns from now on is
    /// ignored.
    ///
    /// A session still `Verifying` becomes `Unauthenticated` so the realm
    /// stops loading and accepts a login. Its persisted token stays in the
    /// store. A session that already moved on (verified, logged out) is
    /// left as it is.
    pub fn teardown(self) {
        let realm = self.realm;
        if let Run::Pending(task) = self.run {
            task.abort();
        }
        let abandoned = self
            .verification
            .is_some_and(|(session, ticket)| session.abandon(&ticket));
        tracing::debug!(%realm, abandoned, "session startup torn down");
    }
}
