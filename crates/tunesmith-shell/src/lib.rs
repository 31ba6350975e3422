//! Application shell for Tunesmith.
//!
//! The shell is the only component that observes both realms. It folds
//! their loading signals and a short route-transition window into one
//! readiness gate:
//!
//! ```text
//!   ready = !user.loading && !admin.loading && !transition_pending
//! ```
//!
//! While the gate is closed views show a neutral placeholder
//! ([`ShellView::Loading`]); once it opens, the current path is resolved
//! and guarded ([`ShellView::Route`]).
//!
//! # Integration
//!
//! ```ignore
//! let mut shell = AppShell::new(
//!     user.subscribe(),
//!     admin.subscribe(),
//!     RouteTable::default(),
//!     TransitionConfig::default(),
//!     "/generate",
//! )?;
//! shell.wait_ready().await?;
//! match shell.view() {
//!     ShellView::Loading => { /* spinner */ }
//!     ShellView::Route(nav) => { /* render or redirect per nav.decision */ }
//! }
//! ```

mod error;
mod shell;
mod transition;

pub use error::ShellError;
pub use shell::{AppShell, Readiness, ShellView};
pub use transition::{TransitionConfig, TransitionTimer};
