//! Lock timing options

use std::time::Duration;

use keylease_common::{
    DEFAULT_LEASE_MS, DEFAULT_OP_TIMEOUT_MS, DEFAULT_RENEW_TIMEOUT_MS, DEFAULT_STOP_TIMEOUT_MS,
    LockSettings, MIN_LEASE_MS,
};

use crate::error::{LockError, Result};

/// Timing options for one lock handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// Lease time-to-live in the store
    pub lease_duration: Duration,
    /// Bound for one acquire or release round trip
    pub op_timeout: Duration,
    /// Bound for one renewal round trip
    pub renew_timeout: Duration,
    /// Bound for waiting on the renewal daemon to acknowledge a stop
    pub stop_timeout: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            lease_duration: Duration::from_millis(DEFAULT_LEASE_MS),
            op_timeout: Duration::from_millis(DEFAULT_OP_TIMEOUT_MS),
            renew_timeout: Duration::from_millis(DEFAULT_RENEW_TIMEOUT_MS),
            stop_timeout: Duration::from_millis(DEFAULT_STOP_TIMEOUT_MS),
        }
    }
}

impl LockOptions {
    pub fn new(lease_duration: Duration) -> Self {
        Self {
            lease_duration,
            ..Default::default()
        }
    }

    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    pub fn with_renew_timeout(mut self, timeout: Duration) -> Self {
        self.renew_timeout = timeout;
        self
    }

    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Renewal cadence: half the lease, so at least one attempt lands before expiry
    pub fn renew_interval(&self) -> Duration {
        self.lease_duration / 2
    }

    pub fn validate(&self) -> Result<()> {
        if self.lease_duration < Duration::from_millis(MIN_LEASE_MS) {
            return Err(LockError::InvalidConfig(format!(
                "lease duration {:?} is below the {}ms minimum",
                self.lease_duration, MIN_LEASE_MS
            )));
        }
        if self.op_timeout.is_zero() || self.renew_timeout.is_zero() {
            return Err(LockError::InvalidConfig(
                "store round-trip timeouts must be non-zero".to_string(),
            ));
        }
        // Release must be able to wait out a renewal already in flight
        if self.stop_timeout <= self.renew_timeout {
            return Err(LockError::InvalidConfig(format!(
                "stop timeout {:?} must exceed renew timeout {:?}",
                self.stop_timeout, self.renew_timeout
            )));
        }
        Ok(())
    }
}

impl From<&LockSettings> for LockOptions {
    fn from(settings: &LockSettings) -> Self {
        Self {
            lease_duration: Duration::from_millis(settings.lease_ms),
            op_timeout: Duration::from_millis(settings.op_timeout_ms),
            renew_timeout: Duration::from_millis(settings.renew_timeout_ms),
            stop_timeout: Duration::from_millis(settings.stop_timeout_ms),
        }
    }
}
