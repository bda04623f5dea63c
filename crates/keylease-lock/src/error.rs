//! Lock error types

use keylease_store::StoreError;

/// Error type for lock acquire and release
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// Transport or backend failure; local state is unchanged and the call may be retried
    #[error("lock store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// Release attempted without holding the lease
    #[error("lock not held by current session")]
    NotHeld,

    /// The lease expired or was taken over before release ran.
    ///
    /// The critical section may have run without exclusivity for some
    /// trailing interval. Retrying the release does not help.
    #[error("lock value mismatch - possibly expired or stolen")]
    OwnershipLost { key: String },

    #[error("invalid lock configuration: {0}")]
    InvalidConfig(String),
}

impl LockError {
    /// Only store failures are worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, LockError::StoreUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, LockError>;
