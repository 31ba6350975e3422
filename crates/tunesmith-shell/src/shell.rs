//! The readiness gate and the view it guards.

use tokio::sync::watch;
use tracing::debug;
use tunesmith_protocol::Realm;
use tunesmith_route::{Navigation, RouteTable, Sessions};
use tunesmith_session::SessionState;

use crate::{ShellError, TransitionConfig, TransitionTimer};

/// What the shell shows right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellView {
    /// The readiness gate is closed.
    Loading,
    /// The gate is open; the current path resolved and guarded.
    Route(Navigation),
}

/// The three inputs of the readiness gate, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub user_loading: bool,
    pub admin_loading: bool,
    pub transition_pending: bool,
}

impl Readiness {
    pub fn is_ready(self) -> bool {
        !self.user_loading && !self.admin_loading && !self.transition_pending
    }
}

/// Readiness gate over both realms' sessions and the transition window.
#[derive(Debug)]
pub struct AppShell {
    user: watch::Receiver<SessionState>,
    admin: watch::Receiver<SessionState>,
    routes: RouteTable,
    timer: TransitionTimer,
    transition: watch::Receiver<bool>,
    current_path: String,
}

impl AppShell {
    /// Builds the shell and opens the first transition window for
    /// `initial_path`, the path the application was launched on.
    ///
    /// Fails if either receiver belongs to the wrong realm.
    pub fn new(
        user: watch::Receiver<SessionState>,
        admin: watch::Receiver<SessionState>,
        routes: RouteTable,
        transition: TransitionConfig,
        initial_path: impl Into<String>,
    ) -> Result<Self, ShellError> {
        check_slot(Realm::User, &user)?;
        check_slot(Realm::Admin, &admin)?;

        let mut timer = TransitionTimer::new(transition);
        let transition = timer.subscribe();
        timer.restart();

        Ok(Self {
            user,
            admin,
            routes,
            timer,
            transition,
            current_path: initial_path.into(),
        })
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Moves to `path`. Returns `false` (and leaves the window alone) when
    /// `path` is already the current path.
    pub fn navigate(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        if path == self.current_path {
            return false;
        }
        debug!(from = %self.current_path, to = %path, "navigate");
        self.current_path = path;
        self.timer.restart();
        true
    }

    pub fn readiness(&self) -> Readiness {
        Readiness {
            user_loading: self.user.borrow().loading(),
            admin_loading: self.admin.borrow().loading(),
            transition_pending: *self.transition.borrow(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.readiness().is_ready()
    }

    /// Resolves once the gate is open.
    ///
    /// Fails with [`ShellError::SessionClosed`] if a session stops
    /// publishing while its realm is still loading.
    pub async fn wait_ready(&mut self) -> Result<(), ShellError> {
        loop {
            let user_loading = self.user.borrow_and_update().loading();
            let admin_loading = self.admin.borrow_and_update().loading();
            let pending = *self.transition.borrow_and_update();
            if !user_loading && !admin_loading && !pending {
                return Ok(());
            }

            tokio::select! {
                changed = self.user.changed(), if user_loading => {
                    changed.map_err(|_| ShellError::SessionClosed(Realm::User))?;
                }
                changed = self.admin.changed(), if admin_loading => {
                    changed.map_err(|_| ShellError::SessionClosed(Realm::Admin))?;
                }
                // The timer's sender lives in `self`, so this never closes.
                _ = self.transition.changed(), if pending => {}
            }
        }
    }

    /// The current view: a placeholder while not ready, otherwise the
    /// guarded current route.
    pub fn view(&self) -> ShellView {
        if !self.is_ready() {
            return ShellView::Loading;
        }
        let user = self.user.borrow();
        let admin = self.admin.borrow();
        ShellView::Route(
            self.routes
                .navigate(&self.current_path, &Sessions::new(&user, &admin)),
        )
    }
}

fn check_slot(slot: Realm, rx: &watch::Receiver<SessionState>) -> Result<(), ShellError> {
    let got = rx.borrow().realm();
    if got == slot {
        Ok(())
    } else {
        Err(ShellError::RealmMismatch { slot, got })
    }
}
