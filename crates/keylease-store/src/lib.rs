//! Keylease Store - atomic lease primitives over a key-value store
//!
//! This crate provides:
//! - `LeaseStore`: the three atomic operations a lease lock needs
//! - `MemoryLeaseStore`: in-process implementation with TTL semantics
//! - `RedisLeaseStore`: Redis implementation (`SET NX PX` plus Lua scripts)
//! - `with_timeout`: bounds a single round trip

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

pub mod error;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_store;

pub use error::{Result, StoreError};
pub use memory::MemoryLeaseStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisLeaseStore;

/// Atomic lease operations required from the backing key-value store.
///
/// Every method is a single atomic step on the store side. Implementations
/// must treat an expired key exactly like an absent one.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Create `key = token` with the given time-to-live only if the key is absent.
    ///
    /// Returns `true` if the key was created, `false` if it already existed.
    async fn set_if_absent(&self, key: &str, token: &str, ttl: Duration) -> Result<bool>;

    /// Delete `key` only if its current value equals `token`.
    ///
    /// Returns `false` when the value differs or the key is missing.
    async fn compare_and_delete(&self, key: &str, token: &str) -> Result<bool>;

    /// Reset the time-to-live of `key` only if its current value equals `token`.
    ///
    /// Returns `false` when the value differs or the key is missing.
    async fn compare_and_extend(&self, key: &str, token: &str, ttl: Duration) -> Result<bool>;
}

/// Run one store round trip, failing with [`StoreError::Timeout`] once `timeout` elapses.
pub async fn with_timeout<T, F>(operation: &'static str, timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout { operation, timeout }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_passes_result_through() {
        let value = with_timeout("noop", Duration::from_secs(1), async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_elapses() {
        let result: Result<bool> =
            with_timeout("stalled", Duration::from_millis(100), std::future::pending()).await;

        match result {
            Err(StoreError::Timeout { operation, timeout }) => {
                assert_eq!(operation, "stalled");
                assert_eq!(timeout, Duration::from_millis(100));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }
}
