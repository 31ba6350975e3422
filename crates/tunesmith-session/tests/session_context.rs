//! Integration tests for the per-realm session state machine.
//!
//! The backend is a scripted in-memory [`AuthApi`]: each test queues the
//! answers it wants, and can hold answers behind a gate to open the window
//! in which a logout or teardown races a response.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tunesmith_protocol::{Credentials, Identity, LoginResponse, Realm, Token};
use tunesmith_session::{
    FileTokenStore, MemoryTokenStore, SessionConfig, SessionContext,
    SessionError, SessionPhase, SessionState, StartOutcome, TokenStore,
};
use tunesmith_transport::{AuthApi, TransportError};

// =========================================================================
// Scripted backend
// =========================================================================

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Login(Realm, String),
    Profile(Realm, Token),
    Logout(Realm, Token),
}

#[derive(Debug, Clone, Copy, Default)]
enum LogoutBehavior {
    #[default]
    Succeed,
    Fail,
    Hang,
}

#[derive(Default)]
struct ScriptedApi {
    logins: Mutex<VecDeque<Result<LoginResponse, TransportError>>>,
    profiles: Mutex<VecDeque<Result<Identity, TransportError>>>,
    logout: LogoutBehavior,
    gate: Option<Arc<Notify>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedApi {
    fn new() -> Self {
        Self::default()
    }

    /// Holds every login/profile answer until `gate` is notified.
    fn gated(mut self, gate: &Arc<Notify>) -> Self {
        self.gate = Some(Arc::clone(gate));
        self
    }

    fn logout_behavior(mut self, behavior: LogoutBehavior) -> Self {
        self.logout = behavior;
        self
    }

    fn login_ok(self, token: &str, identity: Identity) -> Self {
        self.logins.lock().unwrap().push_back(Ok(LoginResponse {
            token: Token::new(token),
            identity,
        }));
        self
    }

    fn login_err(self, err: TransportError) -> Self {
        self.logins.lock().unwrap().push_back(Err(err));
        self
    }

    fn profile_ok(self, identity: Identity) -> Self {
        self.profiles.lock().unwrap().push_back(Ok(identity));
        self
    }

    fn profile_err(self, err: TransportError) -> Self {
        self.profiles.lock().unwrap().push_back(Err(err));
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    async fn hold(&self) {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
    }
}

impl AuthApi for ScriptedApi {
    async fn login(
        &self,
        realm: Realm,
        credentials: &Credentials,
    ) -> Result<LoginResponse, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Login(realm, credentials.principal().to_string()));
        self.hold().await;
        self.logins
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Unreachable("no scripted login".into())))
    }

    async fn profile(
        &self,
        realm: Realm,
        token: &Token,
    ) -> Result<Identity, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Profile(realm, token.clone()));
        self.hold().await;
        self.profiles
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Unreachable("no scripted profile".into())))
    }

    async fn logout(
        &self,
        realm: Realm,
        token: &Token,
    ) -> Result<(), TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Logout(realm, token.clone()));
        match self.logout {
            LogoutBehavior::Succeed => Ok(()),
            LogoutBehavior::Fail => Err(TransportError::Unreachable("offline".into())),
            LogoutBehavior::Hang => std::future::pending().await,
        }
    }
}

// =========================================================================
// Helpers
// =========================================================================

fn amy() -> Identity {
    Identity {
        email: Some("amy@example.com".into()),
        premium: true,
        ..Identity::new("u-1", "amy")
    }
}

fn root() -> Identity {
    Identity {
        role: Some("admin".into()),
        ..Identity::new("a-1", "root")
    }
}

fn context(
    realm: Realm,
    api: &Arc<ScriptedApi>,
    store: &Arc<MemoryTokenStore>,
) -> SessionContext<ScriptedApi> {
    SessionContext::new(
        realm,
        Arc::clone(api),
        Arc::clone(store) as Arc<dyn TokenStore>,
        SessionConfig::default(),
    )
}

/// A user session already signed in as amy with token `t-amy`.
async fn signed_in_user(
    api: ScriptedApi,
) -> (SessionContext<ScriptedApi>, Arc<ScriptedApi>, Arc<MemoryTokenStore>) {
    let api = Arc::new(api.login_ok("t-amy", amy()));
    let store = Arc::new(MemoryTokenStore::new());
    let ctx = context(Realm::User, &api, &store);
    ctx.start().wait().await;
    ctx.login(Credentials::user("amy@example.com", "pw"))
        .await
        .expect("login should succeed");
    (ctx, api, store)
}

// =========================================================================
// start()
// =========================================================================

#[tokio::test]
async fn test_start_without_token_is_unauthenticated_without_network() {
    let api = Arc::new(ScriptedApi::new());
    let store = Arc::new(MemoryTokenStore::new());
    let ctx = context(Realm::User, &api, &store);
    assert!(ctx.loading());

    let handle = ctx.start();

    // Resolved synchronously, before anything is awaited.
    assert!(handle.is_finished());
    assert!(!ctx.loading());
    assert_eq!(ctx.snapshot(), SessionState::anonymous(Realm::User));
    assert_eq!(handle.wait().await, StartOutcome::NoToken);
    assert!(api.calls().is_empty(), "no network call expected");
}

#[tokio::test]
async fn test_start_valid_token_authenticates_and_loading_clears_once() {
    let api = Arc::new(ScriptedApi::new().profile_ok(root()));
    let store = Arc::new(
        MemoryTokenStore::new().with_token(Realm::Admin, Token::new("t-root")),
    );
    let ctx = context(Realm::Admin, &api, &store);
    let mut rx = ctx.subscribe();

    let handle = ctx.start();
    assert!(ctx.loading());
    assert_eq!(ctx.phase(), SessionPhase::Verifying);

    assert_eq!(handle.wait().await, StartOutcome::Verified);

    assert!(!ctx.loading());
    assert!(ctx.is_authenticated());
    assert_eq!(ctx.identity(), Some(root()));
    assert_eq!(
        ctx.snapshot(),
        SessionState::signed_in(Realm::Admin, Token::new("t-root"), root())
    );
    assert_eq!(
        api.calls(),
        vec![Call::Profile(Realm::Admin, Token::new("t-root"))]
    );

    // The receiver sees the final state, and nothing flips back to loading.
    assert!(rx.has_changed().unwrap());
    assert!(!rx.borrow_and_update().loading());
    tokio::task::yield_now().await;
    assert!(!rx.has_changed().unwrap());
}

#[tokio::test]
async fn test_start_rejected_token_clears_store() {
    let api = Arc::new(
        ScriptedApi::new().profile_err(TransportError::Unauthorized(None)),
    );
    let store = Arc::new(
        MemoryTokenStore::new().with_token(Realm::User, Token::new("expired")),
    );
    let ctx = context(Realm::User, &api, &store);

    let outcome = ctx.start().wait().await;

    assert_eq!(outcome, StartOutcome::Rejected);
    assert_eq!(ctx.snapshot(), SessionState::anonymous(Realm::User));
    assert_eq!(store.get(Realm::User).unwrap(), None);
}

#[tokio::test]
async fn test_start_unreachable_clears_store_by_default() {
    let api = Arc::new(
        ScriptedApi::new().profile_err(TransportError::Unreachable("refused".into())),
    );
    let store = Arc::new(
        MemoryTokenStore::new().with_token(Realm::User, Token::new("t")),
    );
    let ctx = context(Realm::User, &api, &store);

    let outcome = ctx.start().wait().await;

    assert_eq!(outcome, StartOutcome::Unreachable);
    assert!(!ctx.is_authenticated());
    assert_eq!(store.get(Realm::User).unwrap(), None);
}

#[tokio::test]
async fn test_start_unreachable_keeps_token_when_configured() {
    let api = Arc::new(
        ScriptedApi::new().profile_err(TransportError::Status {
            status: 503,
            message: None,
        }),
    );
    let store = Arc::new(
        MemoryTokenStore::new().with_token(Realm::User, Token::new("t")),
    );
    let ctx = SessionContext::new(
        Realm::User,
        Arc::clone(&api),
        Arc::clone(&store) as Arc<dyn TokenStore>,
        SessionConfig {
            clear_token_on_unreachable: false,
        },
    );

    let outcome = ctx.start().wait().await;

    // Signed out in memory, but the token survives for the next start.
    assert_eq!(outcome, StartOutcome::Unreachable);
    assert_eq!(ctx.snapshot(), SessionState::anonymous(Realm::User));
    assert_eq!(store.get(Realm::User).unwrap(), Some(Token::new("t")));
}

#[tokio::test]
async fn test_start_twice_is_ignored() {
    let api = Arc::new(ScriptedApi::new());
    let store = Arc::new(MemoryTokenStore::new());
    let ctx = context(Realm::User, &api, &store);

    ctx.start().wait().await;
    let second = ctx.start().wait().await;

    assert_eq!(second, StartOutcome::AlreadyStarted);
}

#[tokio::test]
async fn test_teardown_discards_verification_result() {
    let gate = Arc::new(Notify::new());
    let api = Arc::new(ScriptedApi::new().gated(&gate).profile_ok(amy()));
    let store = Arc::new(
        MemoryTokenStore::new().with_token(Realm::User, Token::new("t")),
    );
    let ctx = context(Realm::User, &api, &store);

    let handle = ctx.start();
    assert_eq!(ctx.phase(), SessionPhase::Verifying);
    handle.teardown();
    gate.notify_one();
    tokio::task::yield_now().await;

    assert!(!ctx.is_authenticated());
    assert!(!ctx.loading(), "a torn-down startup must stop loading");
    assert_eq!(ctx.snapshot(), SessionState::anonymous(Realm::User));
    // Teardown is not a verdict on the token.
    assert_eq!(store.get(Realm::User).unwrap(), Some(Token::new("t")));
}

#[tokio::test]
async fn test_login_after_teardown_during_verification_succeeds() {
    let gate = Arc::new(Notify::new());
    let api = Arc::new(
        ScriptedApi::new()
            .gated(&gate)
            .profile_ok(amy())
            .login_ok("t-new", amy()),
    );
    let store = Arc::new(
        MemoryTokenStore::new().with_token(Realm::User, Token::new("t-old")),
    );
    let ctx = context(Realm::User, &api, &store);
    ctx.start().teardown();

    let pending = {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            ctx.login(Credentials::user("amy@example.com", "pw")).await
        })
    };
    tokio::task::yield_now().await;
    assert_eq!(ctx.phase(), SessionPhase::LoggingIn);
    gate.notify_one();

    let identity = pending.await.expect("task should complete").unwrap();

    assert_eq!(identity, amy());
    assert_eq!(ctx.phase(), SessionPhase::Authenticated);
    assert_eq!(store.get(Realm::User).unwrap(), Some(Token::new("t-new")));
}

#[tokio::test]
async fn test_teardown_during_login_leaves_login_in_charge() {
    let gate = Arc::new(Notify::new());
    let api = Arc::new(ScriptedApi::new().gated(&gate).login_ok("t-amy", amy()));
    let store = Arc::new(MemoryTokenStore::new());
    let ctx = context(Realm::User, &api, &store);
    let handle = ctx.start();

    let pending = {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            ctx.login(Credentials::user("amy@example.com", "pw")).await
        })
    };
    tokio::task::yield_now().await;
    handle.teardown();
    assert_eq!(ctx.phase(), SessionPhase::LoggingIn);
    gate.notify_one();

    let result = pending.await.expect("task should complete");

    assert_eq!(result.unwrap(), amy());
    assert!(ctx.is_authenticated());
    assert!(!ctx.loading());
}

// =========================================================================
// login()
// =========================================================================

#[tokio::test]
async fn test_login_success_sets_token_and_identity_together() {
    let api = Arc::new(ScriptedApi::new().login_ok("t-amy", amy()));
    let store = Arc::new(MemoryTokenStore::new());
    let ctx = context(Realm::User, &api, &store);
    ctx.start().wait().await;

    let identity = ctx
        .login(Credentials::user("amy@example.com", "pw"))
        .await
        .expect("login should succeed");

    assert_eq!(identity, amy());
    assert_eq!(
        ctx.snapshot(),
        SessionState::signed_in(Realm::User, Token::new("t-amy"), amy())
    );
    assert_eq!(store.get(Realm::User).unwrap(), Some(Token::new("t-amy")));
    assert_eq!(
        api.calls(),
        vec![Call::Login(Realm::User, "amy@example.com".into())]
    );
}

#[tokio::test]
async fn test_login_wrong_password_leaves_state_unchanged() {
    let api = Arc::new(
        ScriptedApi::new().login_err(TransportError::Unauthorized(None)),
    );
    let store = Arc::new(MemoryTokenStore::new());
    let ctx = context(Realm::Admin, &api, &store);
    ctx.start().wait().await;
    let before = ctx.snapshot();

    let err = ctx
        .login(Credentials::admin("root", "wrong"))
        .await
        .expect_err("login should fail");

    assert!(matches!(err, SessionError::LoginRejected(ref m) if m == "Admin login failed"));
    assert_eq!(err.user_message(Realm::Admin), "Admin login failed");
    assert_eq!(ctx.snapshot(), before);
    assert_eq!(store.get(Realm::Admin).unwrap(), None);
}

#[tokio::test]
async fn test_login_rejection_carries_server_message() {
    let api = Arc::new(ScriptedApi::new().login_err(TransportError::Status {
        status: 400,
        message: Some("Email not verified".into()),
    }));
    let store = Arc::new(MemoryTokenStore::new());
    let ctx = context(Realm::User, &api, &store);
    ctx.start().wait().await;

    let err = ctx
        .login(Credentials::user("amy@example.com", "pw"))
        .await
        .expect_err("login should fail");

    assert_eq!(err.user_message(Realm::User), "Email not verified");
}

#[tokio::test]
async fn test_login_unreachable_returns_typed_error() {
    let api = Arc::new(
        ScriptedApi::new().login_err(TransportError::Unreachable("timeout".into())),
    );
    let store = Arc::new(MemoryTokenStore::new());
    let ctx = context(Realm::User, &api, &store);
    ctx.start().wait().await;

    let err = ctx
        .login(Credentials::user("amy@example.com", "pw"))
        .await
        .expect_err("login should fail");

    assert!(matches!(err, SessionError::Unreachable(_)));
    assert_eq!(ctx.phase(), SessionPhase::Unauthenticated);
}

#[tokio::test]
async fn test_login_with_other_realm_credentials_is_rejected_locally() {
    let api = Arc::new(ScriptedApi::new());
    let store = Arc::new(MemoryTokenStore::new());
    let ctx = context(Realm::Admin, &api, &store);
    ctx.start().wait().await;

    let err = ctx
        .login(Credentials::user("amy@example.com", "pw"))
        .await
        .expect_err("user credentials can't sign into admin");

    assert!(matches!(
        err,
        SessionError::RealmMismatch {
            expected: Realm::Admin,
            got: Realm::User
        }
    ));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_login_while_authenticated_is_rejected() {
    let (ctx, _api, _store) = signed_in_user(ScriptedApi::new()).await;

    let err = ctx
        .login(Credentials::user("amy@example.com", "pw"))
        .await
        .expect_err("already signed in");

    assert!(matches!(err, SessionError::AlreadyAuthenticated(Realm::User)));
    assert!(ctx.is_authenticated());
}

#[tokio::test]
async fn test_login_while_verifying_is_busy() {
    let gate = Arc::new(Notify::new());
    let api = Arc::new(ScriptedApi::new().gated(&gate).profile_ok(amy()));
    let store = Arc::new(
        MemoryTokenStore::new().with_token(Realm::User, Token::new("t")),
    );
    let ctx = context(Realm::User, &api, &store);
    let handle = ctx.start();

    let err = ctx
        .login(Credentials::user("amy@example.com", "pw"))
        .await
        .expect_err("verification in progress");

    assert!(matches!(
        err,
        SessionError::Busy {
            phase: SessionPhase::Verifying,
            ..
        }
    ));
    gate.notify_one();
    assert_eq!(handle.wait().await, StartOutcome::Verified);
}

#[tokio::test]
async fn test_login_cancelled_by_caller_returns_to_unauthenticated() {
    let gate = Arc::new(Notify::new());
    let api = Arc::new(ScriptedApi::new().gated(&gate).login_ok("t", amy()));
    let store = Arc::new(MemoryTokenStore::new());
    let ctx = context(Realm::User, &api, &store);
    ctx.start().wait().await;

    let result = tokio::time::timeout(
        Duration::from_millis(20),
        ctx.login(Credentials::user("amy@example.com", "pw")),
    )
    .await;

    assert!(result.is_err(), "login should still be parked at the gate");
    assert_eq!(ctx.snapshot(), SessionState::anonymous(Realm::User));
}

// =========================================================================
// logout()
// =========================================================================

#[tokio::test]
async fn test_logout_is_immediate_even_if_notify_hangs() {
    let (ctx, api, store) =
        signed_in_user(ScriptedApi::new().logout_behavior(LogoutBehavior::Hang)).await;

    ctx.logout();

    // No await between logout() and these checks.
    assert!(!ctx.is_authenticated());
    assert_eq!(ctx.snapshot(), SessionState::anonymous(Realm::User));
    assert_eq!(store.get(Realm::User).unwrap(), None);

    tokio::task::yield_now().await;
    assert!(api.calls().contains(&Call::Logout(Realm::User, Token::new("t-amy"))));
    assert!(!ctx.is_authenticated());
}

#[tokio::test]
async fn test_logout_notify_failure_is_not_rolled_back() {
    let (ctx, api, _store) =
        signed_in_user(ScriptedApi::new().logout_behavior(LogoutBehavior::Fail)).await;

    ctx.logout();
    tokio::task::yield_now().await;

    assert!(api.calls().contains(&Call::Logout(Realm::User, Token::new("t-amy"))));
    assert_eq!(ctx.phase(), SessionPhase::Unauthenticated);
}

#[tokio::test]
async fn test_logout_when_signed_out_sends_nothing() {
    let api = Arc::new(ScriptedApi::new());
    let store = Arc::new(MemoryTokenStore::new());
    let ctx = context(Realm::User, &api, &store);
    ctx.start().wait().await;
    let mut rx = ctx.subscribe();

    ctx.logout();
    tokio::task::yield_now().await;

    assert!(api.calls().is_empty());
    assert!(!rx.has_changed().unwrap(), "nothing changed, nothing published");
    assert!(!rx.borrow_and_update().is_authenticated());
}

#[tokio::test]
async fn test_logout_on_admin_leaves_user_realm_untouched() {
    let api = Arc::new(
        ScriptedApi::new()
            .profile_ok(amy())
            .profile_ok(root()),
    );
    let store = Arc::new(
        MemoryTokenStore::new()
            .with_token(Realm::User, Token::new("t-amy"))
            .with_token(Realm::Admin, Token::new("t-root")),
    );
    let user = context(Realm::User, &api, &store);
    let admin = context(Realm::Admin, &api, &store);
    user.start().wait().await;
    admin.start().wait().await;
    let user_before = user.snapshot();

    admin.logout();

    assert!(!admin.is_authenticated());
    assert_eq!(user.snapshot(), user_before);
    assert_eq!(store.get(Realm::User).unwrap(), Some(Token::new("t-amy")));
    assert_eq!(store.get(Realm::Admin).unwrap(), None);
}

#[tokio::test]
async fn test_logout_on_user_leaves_admin_realm_untouched() {
    let api = Arc::new(
        ScriptedApi::new()
            .profile_ok(amy())
            .profile_ok(root()),
    );
    let store = Arc::new(
        MemoryTokenStore::new()
            .with_token(Realm::User, Token::new("t-amy"))
            .with_token(Realm::Admin, Token::new("t-root")),
    );
    let user = context(Realm::User, &api, &store);
    let admin = context(Realm::Admin, &api, &store);
    user.start().wait().await;
    admin.start().wait().await;
    let admin_before = admin.snapshot();
    assert!(admin_before.is_authenticated());

    user.logout();

    assert!(!user.is_authenticated());
    assert_eq!(admin.snapshot(), admin_before);
    assert_eq!(store.get(Realm::Admin).unwrap(), Some(Token::new("t-root")));
    assert_eq!(store.get(Realm::User).unwrap(), None);
}

// =========================================================================
// Stale responses
// =========================================================================

#[tokio::test]
async fn test_logout_during_verification_discards_result() {
    let gate = Arc::new(Notify::new());
    let api = Arc::new(ScriptedApi::new().gated(&gate).profile_ok(amy()));
    let store = Arc::new(
        MemoryTokenStore::new().with_token(Realm::User, Token::new("t")),
    );
    let ctx = context(Realm::User, &api, &store);

    let handle = ctx.start();
    ctx.logout();
    gate.notify_one();

    assert_eq!(handle.wait().await, StartOutcome::Discarded);
    assert_eq!(ctx.snapshot(), SessionState::anonymous(Realm::User));
    assert_eq!(store.get(Realm::User).unwrap(), None);
}

#[tokio::test]
async fn test_logout_during_login_discards_response() {
    let gate = Arc::new(Notify::new());
    let api = Arc::new(ScriptedApi::new().gated(&gate).login_ok("t-amy", amy()));
    let store = Arc::new(MemoryTokenStore::new());
    let ctx = context(Realm::User, &api, &store);
    ctx.start().wait().await;

    let pending = {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            ctx.login(Credentials::user("amy@example.com", "pw")).await
        })
    };
    tokio::task::yield_now().await;
    assert_eq!(ctx.phase(), SessionPhase::LoggingIn);
    assert!(!ctx.loading(), "a login is not startup loading");

    ctx.logout();
    gate.notify_one();
    let result = pending.await.expect("task should complete");

    assert!(matches!(result, Err(SessionError::Superseded(Realm::User))));
    assert_eq!(ctx.snapshot(), SessionState::anonymous(Realm::User));
    assert_eq!(store.get(Realm::User).unwrap(), None);
}

// =========================================================================
// Persistence across restarts
// =========================================================================

#[tokio::test]
async fn test_token_persisted_by_login_is_verified_on_next_start() {
    let dir = tempfile::tempdir().expect("tempdir");

    // First run: sign in.
    {
        let api = Arc::new(ScriptedApi::new().login_ok("t-root", root()));
        let store: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(dir.path()));
        let ctx = SessionContext::new(Realm::Admin, api, store, SessionConfig::default());
        ctx.start().wait().await;
        ctx.login(Credentials::admin("root", "pw")).await.unwrap();
    }

    // Second run: the token comes back from disk and is verified.
    let api = Arc::new(ScriptedApi::new().profile_ok(root()));
    let store: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(dir.path()));
    let ctx = SessionContext::new(
        Realm::Admin,
        Arc::clone(&api),
        store,
        SessionConfig::default(),
    );

    assert_eq!(ctx.start().wait().await, StartOutcome::Verified);
    assert_eq!(
        api.calls(),
        vec![Call::Profile(Realm::Admin, Token::new("t-root"))]
    );
    assert_eq!(ctx.identity(), Some(root()));
}
