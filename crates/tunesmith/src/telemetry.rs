//! Tracing setup.

use tracing_subscriber::{EnvFilter, fmt};

use crate::TunesmithError;

/// Installs a global `fmt` subscriber.
///
/// The filter comes from `RUST_LOG` when it is set and parses, otherwise
/// from `default_directive` (e.g. `"info"` or `"tunesmith_session=debug"`).
/// Fails instead of panicking when a subscriber is already installed, so
/// embedders that bring their own can call this unconditionally.
pub fn init_tracing(default_directive: &str) -> Result<(), TunesmithError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .map_err(|e| TunesmithError::Telemetry(e.to_string()))?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| TunesmithError::Telemetry(e.to_string()))
}
