//! Lease lock handle.
//!
//! A [`LeaseLock`] owns at most one lease at a time for one resource:
//! - `acquire` is a single-shot try-lock (`SET NX` with the lease as TTL)
//! - while held, a renewal daemon extends the lease every half lease
//! - `release` stops the daemon, waits for it, then deletes the lease only
//!   if it still carries this acquisition's token
//!
//! Handles share nothing but the store; two handles for the same resource
//! contend exactly like two processes would.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use keylease_common::lease_key;
use keylease_store::{LeaseStore, with_timeout};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{LockError, Result};
use crate::metrics::{self, outcome};
use crate::options::LockOptions;
use crate::watchdog::{RenewalTarget, Watchdog};

/// Externally visible lock state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockState {
    #[default]
    Unlocked,
    Held,
}

impl LockState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockState::Unlocked => "unlocked",
            LockState::Held => "held",
        }
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Distributed lock interface
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Try to take the lock once; `Ok(false)` means someone else holds it
    async fn acquire(&self) -> Result<bool>;

    /// Give the lock back
    async fn release(&self) -> Result<()>;

    /// Whether this handle believes it holds the lock
    async fn is_held(&self) -> bool;
}

/// The lease owned by one successful acquisition
struct HeldLease {
    token: String,
    acquired_at: Instant,
    /// Taken by the first release attempt; a retried release finds it gone
    watchdog: Option<Watchdog>,
}

/// Lease-based lock over a [`LeaseStore`]
pub struct LeaseLock<S: LeaseStore + ?Sized> {
    store: Arc<S>,
    resource: String,
    key: String,
    options: LockOptions,
    lease: Mutex<Option<HeldLease>>,
}

impl<S: LeaseStore + ?Sized + 'static> LeaseLock<S> {
    /// Create a handle for `resource`. No store call is made.
    pub fn new(store: Arc<S>, resource: impl Into<String>, options: LockOptions) -> Result<Self> {
        let resource = resource.into();
        if resource.is_empty() {
            return Err(LockError::InvalidConfig(
                "resource name must not be empty".to_string(),
            ));
        }
        options.validate()?;

        Ok(Self {
            store,
            key: lease_key(&resource),
            resource,
            options,
            lease: Mutex::new(None),
        })
    }

    /// Create a handle with default timeouts and the given lease duration
    pub fn with_lease(
        store: Arc<S>,
        resource: impl Into<String>,
        lease_duration: Duration,
    ) -> Result<Self> {
        Self::new(store, resource, LockOptions::new(lease_duration))
    }

    /// Resource name as given by the caller
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Namespaced store key
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn options(&self) -> &LockOptions {
        &self.options
    }

    /// Ownership token of the current acquisition, if any
    pub async fn token(&self) -> Option<String> {
        self.lease.lock().await.as_ref().map(|lease| lease.token.clone())
    }

    pub async fn is_held(&self) -> bool {
        self.lease.lock().await.is_some()
    }

    pub async fn state(&self) -> LockState {
        if self.is_held().await {
            LockState::Held
        } else {
            LockState::Unlocked
        }
    }

    /// Try to take the lock once.
    ///
    /// Returns `Ok(true)` on success and `Ok(false)` if another owner holds
    /// the lease. If this handle already holds the lock it returns `Ok(true)`
    /// without asking the store, so a lease that expired and was taken over
    /// elsewhere goes unnoticed until the next release.
    pub async fn acquire(&self) -> Result<bool> {
        let mut lease = self.lease.lock().await;
        if lease.is_some() {
            metrics::record_acquire(outcome::REENTRANT);
            return Ok(true);
        }

        let token = Uuid::new_v4().to_string();
        let created = with_timeout(
            "set_if_absent",
            self.options.op_timeout,
            self.store
                .set_if_absent(&self.key, &token, self.options.lease_duration),
        )
        .await;

        let created = match created {
            Ok(created) => created,
            Err(e) => {
                warn!(key = %self.key, error = %e, "Lock acquire failed");
                metrics::record_acquire(outcome::ERROR);
                return Err(e.into());
            }
        };

        if !created {
            debug!(key = %self.key, "Lock held by another owner");
            metrics::record_acquire(outcome::CONTENDED);
            return Ok(false);
        }

        let watchdog = Watchdog::spawn(RenewalTarget {
            store: Arc::clone(&self.store),
            key: self.key.clone(),
            token: token.clone(),
            lease_duration: self.options.lease_duration,
            renew_timeout: self.options.renew_timeout,
        });

        *lease = Some(HeldLease {
            token,
            acquired_at: Instant::now(),
            watchdog: Some(watchdog),
        });

        debug!(key = %self.key, "Lock acquired");
        metrics::record_acquire(outcome::ACQUIRED);
        Ok(true)
    }

    /// Call [`acquire`](Self::acquire) up to `max_attempts` times, sleeping
    /// `interval` between attempts.
    ///
    /// Stops at the first success or the first error.
    pub async fn acquire_with_retry(&self, max_attempts: u32, interval: Duration) -> Result<bool> {
        let attempts = max_attempts.max(1);
        for attempt in 1..=attempts {
            if self.acquire().await? {
                return Ok(true);
            }
            if attempt < attempts {
                tokio::time::sleep(interval).await;
            }
        }
        Ok(false)
    }

    /// Give the lock back.
    ///
    /// Renewal is stopped before the delete is attempted. Errors:
    /// - `NotHeld`: nothing to release; the store is not touched
    /// - `StoreUnavailable`: the delete did not complete; the lock is still
    ///   held locally and the release may be retried
    /// - `OwnershipLost`: the lease had expired or been taken over; the
    ///   handle is unlocked afterwards
    pub async fn release(&self) -> Result<()> {
        let mut guard = self.lease.lock().await;
        let Some(lease) = guard.as_mut() else {
            metrics::record_release(outcome::NOT_HELD);
            return Err(LockError::NotHeld);
        };

        if let Some(watchdog) = lease.watchdog.take()
            && !watchdog.stop(self.options.stop_timeout).await
        {
            warn!(
                key = %self.key,
                timeout = ?self.options.stop_timeout,
                "Lease renewal did not acknowledge stop; aborted"
            );
        }

        let deleted = with_timeout(
            "compare_and_delete",
            self.options.op_timeout,
            self.store.compare_and_delete(&self.key, &lease.token),
        )
        .await;

        match deleted {
            Ok(true) => {
                let held_for = lease.acquired_at.elapsed();
                *guard = None;
                debug!(key = %self.key, ?held_for, "Lock released");
                metrics::record_release(outcome::RELEASED);
                metrics::record_held_duration(held_for.as_secs_f64());
                Ok(())
            }
            Ok(false) => {
                *guard = None;
                warn!(key = %self.key, "Lock lease lost before release");
                metrics::record_release(outcome::OWNERSHIP_LOST);
                Err(LockError::OwnershipLost {
                    key: self.key.clone(),
                })
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "Lock release failed");
                metrics::record_release(outcome::ERROR);
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl<S: LeaseStore + ?Sized + 'static> DistributedLock for LeaseLock<S> {
    async fn acquire(&self) -> Result<bool> {
        LeaseLock::acquire(self).await
    }

    async fn release(&self) -> Result<()> {
        LeaseLock::release(self).await
    }

    async fn is_held(&self) -> bool {
        LeaseLock::is_held(self).await
    }
}

impl<S: LeaseStore + ?Sized> fmt::Debug for LeaseLock<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeaseLock")
            .field("key", &self.key)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
