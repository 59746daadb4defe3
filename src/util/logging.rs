//! Tracing subscriber setup.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the log filter (`EnvFilter` syntax).
pub const LOG_ENV: &str = "AHDS_LOG";

/// Install a global fmt subscriber filtered by `AHDS_LOG` (default `warn`).
///
/// Returns `false` when a global subscriber is already installed.
pub fn init_logging() -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .is_ok()
}
