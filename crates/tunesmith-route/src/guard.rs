//! The guard policy: render, redirect, or wait.

use tunesmith_protocol::Realm;
use tunesmith_session::SessionState;

use crate::RouteRequirement;

/// What the rendering layer should do with a navigation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Show the target.
    Render,
    /// Send the visitor to this login route instead.
    RedirectTo(&'static str),
    /// Session state isn't known yet; show a neutral placeholder.
    Defer,
}

impl GuardDecision {
    pub fn is_render(self) -> bool {
        matches!(self, Self::Render)
    }
}

/// The guard for one realm's protected routes.
///
/// Each realm has its own guard and its own login route. A guard only ever
/// accepts a session of its own realm: an admin guard handed a signed-in
/// user session redirects to the admin login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteGuard {
    realm: Realm,
}

impl RouteGuard {
    pub fn new(realm: Realm) -> Self {
        Self { realm }
    }

    pub fn realm(&self) -> Realm {
        self.realm
    }

    /// Where this guard sends anonymous visitors.
    pub fn login_path(&self) -> &'static str {
        self.realm.login_path()
    }

    /// Decides for a route that requires this guard's realm.
    ///
    /// While `state` is loading the answer is always [`GuardDecision::Defer`]:
    /// redirecting then would bounce every reload to the login page before
    /// the persisted token has been checked.
    pub fn check(&self, state: &SessionState) -> GuardDecision {
        if state.loading() {
            return GuardDecision::Defer;
        }
        if state.realm() == self.realm && state.is_authenticated() {
            GuardDecision::Render
        } else {
            GuardDecision::RedirectTo(self.login_path())
        }
    }
}

/// Decides for `requirement` given the session that requirement is
/// checked against.
///
/// Never returns [`GuardDecision::RedirectTo`] while `state` is loading.
pub fn decide(requirement: RouteRequirement, state: &SessionState) -> GuardDecision {
    match requirement {
        _ if state.loading() => GuardDecision::Defer,
        RouteRequirement::Public => GuardDecision::Render,
        RouteRequirement::Realm(realm) => RouteGuard::new(realm).check(state),
    }
}

/// Both realms' session states, borrowed for one decision.
#[derive(Debug, Clone, Copy)]
pub struct Sessions<'a> {
    pub user: &'a SessionState,
    pub admin: &'a SessionState,
}

impl<'a> Sessions<'a> {
    pub fn new(user: &'a SessionState, admin: &'a SessionState) -> Self {
        Self { user, admin }
    }

    /// The state of `realm`'s session.
    pub fn for_realm(&self, realm: Realm) -> &'a SessionState {
        match realm {
            Realm::User => self.user,
            Realm::Admin => self.admin,
        }
    }

    /// `true` while either realm is still resolving its startup state.
    pub fn any_loading(&self) -> bool {
        self.user.loading() || self.admin.loading()
    }

    /// Decides for `requirement`, picking the matching realm's state.
    ///
    /// Public routes wait for both realms, the same way the shell does.
    pub fn decide(&self, requirement: RouteRequirement) -> GuardDecision {
        match requirement {
            RouteRequirement::Public if self.any_loading() => GuardDecision::Defer,
            RouteRequirement::Public => GuardDecision::Render,
            RouteRequirement::Realm(realm) => decide(requirement, self.for_realm(realm)),
        }
    }
}
