//! # Tunesmith
//!
//! Client-side authentication core for the Tunesmith music generation app.
//!
//! Two independent realms (listeners and administrators) each keep a
//! persisted bearer token, verify it against the backend on startup, and
//! expose a session state machine. A route guard decides what each
//! navigation target shows, and an application shell folds both realms'
//! loading signals into one readiness gate.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tunesmith::prelude::*;
//!
//! # async fn run() -> Result<(), TunesmithError> {
//! let mut app = Tunesmith::builder()
//!     .config(TunesmithConfig::from_env()?)
//!     .initial_path("/generate")
//!     .build()?;
//!
//! app.start().wait().await;
//! app.shell_mut().wait_ready().await?;
//!
//! if let ShellView::Route(nav) = app.view() {
//!     println!("{} -> {:?}", nav.route, nav.decision);
//! }
//! # Ok(())
//! # }
//! ```

mod app;
mod config;
mod error;
pub mod telemetry;

pub use app::{Startup, Tunesmith, TunesmithBuilder};
pub use config::{ConfigError, TunesmithConfig};
pub use error::TunesmithError;

pub use tunesmith_protocol as protocol;
pub use tunesmith_route as route;
pub use tunesmith_session as session;
pub use tunesmith_shell as shell;
pub use tunesmith_transport as transport;

pub mod prelude {
    pub use crate::{
        ConfigError, Startup, Tunesmith, TunesmithBuilder, TunesmithConfig,
        TunesmithError,
    };
    pub use tunesmith_protocol::{Credentials, Identity, Realm, Token};
    pub use tunesmith_route::{
        GuardDecision, Navigation, RouteRequirement, RouteTable,
    };
    pub use tunesmith_session::{
        SessionContext, SessionError, SessionPhase, SessionState, StartOutcome,
        TokenStore,
    };
    pub use tunesmith_shell::{AppShell, ShellView};
    pub use tunesmith_transport::{AuthApi, HttpAuthApi};
}
