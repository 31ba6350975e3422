//! Bootstrap: wires config, token store, backend client, both realms'
//! sessions and the shell into one [`Tunesmith`] value.

use std::sync::Arc;

use tracing::info;
use tunesmith_protocol::{Credentials, Identity, Realm};
use tunesmith_route::RouteTable;
use tunesmith_session::{
    FileTokenStore, SessionContext, SessionError, StartHandle, StartOutcome,
    TokenStore,
};
use tunesmith_shell::{AppShell, ShellView};
use tunesmith_transport::{AuthApi, HttpAuthApi};

use crate::{TunesmithConfig, TunesmithError};

/// Builder for [`Tunesmith`].
///
/// # Example
///
/// ```rust,ignore
/// let app = Tunesmith::builder()
///     .config(TunesmithConfig::from_env()?)
///     .initial_path("/admin")
///     .build()?;
/// let startup = app.start();
/// ```
pub struct TunesmithBuilder {
    config: TunesmithConfig,
    routes: Option<RouteTable>,
    store: Option<Arc<dyn TokenStore>>,
    initial_path: String,
}

impl TunesmithBuilder {
    pub fn new() -> Self {
        Self {
            config: TunesmithConfig::default(),
            routes: None,
            store: None,
            initial_path: "/".to_string(),
        }
    }

    pub fn config(mut self, config: TunesmithConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the built-in route table.
    pub fn routes(mut self, routes: RouteTable) -> Self {
        self.routes = Some(routes);
        self
    }

    /// Uses `store` instead of a [`FileTokenStore`] under
    /// `config.storage_dir`.
    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// The path the application is launched on.
    pub fn initial_path(mut self, path: impl Into<String>) -> Self {
        self.initial_path = path.into();
        self
    }

    /// Builds against the HTTP backend at `config.api_base_url`.
    pub fn build(self) -> Result<Tunesmith<HttpAuthApi>, TunesmithError> {
        let api = HttpAuthApi::new(self.config.http_config())?;
        self.build_with_api(api)
    }

    /// Builds against any [`AuthApi`] implementation.
    ///
    /// Call from within a Tokio runtime: the shell schedules its first
    /// transition window immediately.
    pub fn build_with_api<A: AuthApi>(self, api: A) -> Result<Tunesmith<A>, TunesmithError> {
        let config = self.config;
        let store: Arc<dyn TokenStore> = match self.store {
            Some(store) => store,
            None => Arc::new(FileTokenStore::new(&config.storage_dir)),
        };
        let api = Arc::new(api);
        let session_config = config.session_config();

        let user = SessionContext::new(
            Realm::User,
            Arc::clone(&api),
            Arc::clone(&store),
            session_config.clone(),
        );
        let admin = SessionContext::new(Realm::Admin, api, store, session_config);

        let shell = AppShell::new(
            user.subscribe(),
            admin.subscribe(),
            self.routes.unwrap_or_default(),
            config.transition_config(),
            self.initial_path,
        )?;

        info!(
            api = %config.api_base_url,
            storage = %config.storage_dir.display(),
            "tunesmith client built"
        );
        Ok(Tunesmith {
            config,
            user,
            admin,
            shell,
        })
    }
}

impl Default for TunesmithBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Both realms' startup handles, returned by [`Tunesmith::start`].
pub struct Startup {
    pub user: StartHandle,
    pub admin: StartHandle,
}

impl Startup {
    /// Waits for both realms, returning `(user, admin)` outcomes.
    pub async fn wait(self) -> (StartOutcome, StartOutcome) {
        tokio::join!(self.user.wait(), self.admin.wait())
    }

    /// Abandons pending verifications; see [`StartHandle::teardown`].
    pub fn teardown(self) {
        self.user.teardown();
        self.admin.teardown();
    }
}

/// The assembled client core.
pub struct Tunesmith<A: AuthApi = HttpAuthApi> {
    config: TunesmithConfig,
    user: SessionContext<A>,
    admin: SessionContext<A>,
    shell: AppShell,
}

impl Tunesmith<HttpAuthApi> {
    pub fn builder() -> TunesmithBuilder {
        TunesmithBuilder::new()
    }
}

impl<A: AuthApi> Tunesmith<A> {
    pub fn config(&self) -> &TunesmithConfig {
        &self.config
    }

    pub fn session(&self, realm: Realm) -> &SessionContext<A> {
        match realm {
            Realm::User => &self.user,
            Realm::Admin => &self.admin,
        }
    }

    pub fn user(&self) -> &SessionContext<A> {
        &self.user
    }

    pub fn admin(&self) -> &SessionContext<A> {
        &self.admin
    }

    pub fn shell(&self) -> &AppShell {
        &self.shell
    }

    pub fn shell_mut(&mut self) -> &mut AppShell {
        &mut self.shell
    }

    /// Starts verification of both realms' persisted tokens.
    pub fn start(&self) -> Startup {
        Startup {
            user: self.user.start(),
            admin: self.admin.start(),
        }
    }

    /// Signs in to the realm the credentials belong to.
    pub async fn login(&self, credentials: Credentials) -> Result<Identity, SessionError> {
        self.session(credentials.realm()).login(credentials).await
    }

    pub fn logout(&self, realm: Realm) {
        self.session(realm).logout();
    }

    /// See [`AppShell::navigate`].
    pub fn navigate(&mut self, path: impl Into<String>) -> bool {
        self.shell.navigate(path)
    }

    pub fn is_ready(&self) -> bool {
        self.shell.is_ready()
    }

    pub fn view(&self) -> ShellView {
        self.shell.view()
    }
}
