//! Tracing subscriber setup.
//!
//! Library code only emits `tracing` events; binaries and tests that want to
//! see them call [`init_tracing`] once. `RUST_LOG` takes precedence over the
//! directive passed in.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Default filter directive when neither `RUST_LOG` nor a caller directive is given
pub const DEFAULT_LOG_DIRECTIVE: &str = "info";

/// Install a global registry with an env filter and a fmt layer.
///
/// Returns an error instead of panicking if a global subscriber is already
/// installed, so repeated calls from tests are harmless.
pub fn init_tracing(directive: Option<&str>) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(directive.unwrap_or(DEFAULT_LOG_DIRECTIVE))?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()?;

    tracing::debug!("Tracing initialized");
    Ok(())
}
