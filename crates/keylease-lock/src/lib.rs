//! Keylease Lock - lease-based distributed lock
//!
//! This crate provides:
//! - `LeaseLock`: try-lock acquire, automatic renewal, ownership-checked release
//! - `DistributedLock`: object-safe lock interface
//! - `LockOptions`: lease and round-trip timings
//! - Renewal daemon (watchdog) with stop-then-acknowledge shutdown
//! - Outcome metrics through the `metrics` facade
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use keylease_lock::{LeaseLock, LockError};
//! use keylease_store::MemoryLeaseStore;
//!
//! # async fn run() -> Result<(), LockError> {
//! let store = Arc::new(MemoryLeaseStore::new());
//! let lock = LeaseLock::with_lease(store, "orders", Duration::from_secs(10))?;
//!
//! if lock.acquire().await? {
//!     // critical section; the lease is renewed in the background
//!     lock.release().await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod lock;
pub mod metrics;
pub mod options;
mod watchdog;

pub use error::{LockError, Result};
pub use lock::{DistributedLock, LeaseLock, LockState};
pub use options::LockOptions;

#[cfg(feature = "redis")]
pub use keylease_store::RedisLeaseStore;
pub use keylease_store::{LeaseStore, MemoryLeaseStore, StoreError};

/// Build a Redis-backed lock from loaded settings
#[cfg(feature = "redis")]
pub async fn redis_lock(
    settings: &keylease_common::LockSettings,
    resource: impl Into<String>,
) -> Result<LeaseLock<RedisLeaseStore>> {
    let store = RedisLeaseStore::connect(&settings.redis_url).await?;
    LeaseLock::new(
        std::sync::Arc::new(store),
        resource,
        LockOptions::from(settings),
    )
}
