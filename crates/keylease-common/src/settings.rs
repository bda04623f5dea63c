//! Lock settings loading.
//!
//! Sources are layered the same way for every deployment: built-in defaults,
//! then an optional settings file, then `KEYLEASE_*` environment variables.

use anyhow::Context;
use config::{Config, Environment};
use serde::Deserialize;

use crate::{
    DEFAULT_LEASE_MS, DEFAULT_OP_TIMEOUT_MS, DEFAULT_REDIS_URL, DEFAULT_RENEW_TIMEOUT_MS,
    DEFAULT_STOP_TIMEOUT_MS, ENV_PREFIX,
};

/// Externally configurable lock settings (all durations in milliseconds)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LockSettings {
    /// Lease time-to-live; renewal runs every half of it
    pub lease_ms: u64,
    /// Bound for one acquire or release round trip
    pub op_timeout_ms: u64,
    /// Bound for one renewal round trip
    pub renew_timeout_ms: u64,
    /// Bound for waiting on the renewal daemon to stop
    pub stop_timeout_ms: u64,
    /// Store endpoint
    pub redis_url: String,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            lease_ms: DEFAULT_LEASE_MS,
            op_timeout_ms: DEFAULT_OP_TIMEOUT_MS,
            renew_timeout_ms: DEFAULT_RENEW_TIMEOUT_MS,
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
            redis_url: DEFAULT_REDIS_URL.to_string(),
        }
    }
}

impl LockSettings {
    /// Load settings from defaults, an optional file and the environment.
    ///
    /// The file format is picked from its extension (`.toml`, `.yaml`, `.json`).
    /// A missing file is not an error.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let mut builder = Config::builder()
            .set_default("lease_ms", DEFAULT_LEASE_MS)?
            .set_default("op_timeout_ms", DEFAULT_OP_TIMEOUT_MS)?
            .set_default("renew_timeout_ms", DEFAULT_RENEW_TIMEOUT_MS)?
            .set_default("stop_timeout_ms", DEFAULT_STOP_TIMEOUT_MS)?
            .set_default("redis_url", DEFAULT_REDIS_URL)?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to build lock settings")?;

        let settings: LockSettings = settings
            .try_deserialize()
            .context("failed to deserialize lock settings")?;

        tracing::debug!(
            lease_ms = settings.lease_ms,
            op_timeout_ms = settings.op_timeout_ms,
            "Lock settings loaded"
        );

        Ok(settings)
    }
}
