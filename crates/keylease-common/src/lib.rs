//! Keylease Common - Shared constants, settings, and logging setup
//!
//! This crate provides the foundational pieces used across all Keylease components:
//! - Lease key namespacing
//! - Default timings for leases and store round trips
//! - Settings loading (`config` crate: defaults, file, environment)
//! - Tracing subscriber initialization

pub mod logging;
pub mod settings;

// Re-exports for convenience
pub use logging::init_tracing;
pub use settings::LockSettings;

/// Namespace prepended to every resource name to form the store key
pub const LOCK_KEY_PREFIX: &str = "lock:";

/// Default lease time-to-live (30 seconds)
pub const DEFAULT_LEASE_MS: u64 = 30_000;

/// Default bound for a single acquire or release round trip
pub const DEFAULT_OP_TIMEOUT_MS: u64 = 5_000;

/// Default bound for a single renewal round trip
pub const DEFAULT_RENEW_TIMEOUT_MS: u64 = 5_000;

/// Default bound for waiting on the renewal daemon to acknowledge a stop.
///
/// Kept above the renewal bound so an in-flight renewal can finish on its own.
pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 10_000;

/// Smallest lease accepted; half of it must still be a non-zero renewal period
pub const MIN_LEASE_MS: u64 = 2;

/// Default Redis endpoint
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Environment variable prefix for settings overrides (e.g. `KEYLEASE_LEASE_MS`)
pub const ENV_PREFIX: &str = "KEYLEASE";

/// Build the namespaced store key for a resource name
pub fn lease_key(resource: &str) -> String {
    format!("{}{}", LOCK_KEY_PREFIX, resource)
}
