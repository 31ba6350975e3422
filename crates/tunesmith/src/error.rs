//! Unified error type for the Tunesmith client core.

use tunesmith_protocol::ProtocolError;
use tunesmith_route::RouteError;
use tunesmith_session::{SessionError, StoreError};
use tunesmith_shell::ShellError;
use tunesmith_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TunesmithError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Login, logout or verification failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// The route table is malformed.
    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Shell(#[from] ShellError),

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The tracing filter didn't parse or a global subscriber was
    /// already installed.
    #[error("tracing setup failed: {0}")]
    Telemetry(String),
}
