// Metrics for lock observability
// Counters per outcome for acquire, renew and release, plus held-time histogram

use metrics::{counter, describe_counter, describe_histogram, histogram};

pub const ACQUIRE_TOTAL: &str = "keylease_acquire_total";
pub const RENEW_TOTAL: &str = "keylease_renew_total";
pub const RELEASE_TOTAL: &str = "keylease_release_total";
pub const HELD_DURATION_SECONDS: &str = "keylease_held_duration_seconds";

/// Initialize metric descriptions
/// Should be called once at application startup, after installing a recorder
pub fn describe_metrics() {
    describe_counter!(ACQUIRE_TOTAL, "Total number of lock acquire attempts by outcome");
    describe_counter!(RENEW_TOTAL, "Total number of lease renewal attempts by outcome");
    describe_counter!(RELEASE_TOTAL, "Total number of lock release attempts by outcome");
    describe_histogram!(
        HELD_DURATION_SECONDS,
        "Time between acquiring and releasing a lease in seconds"
    );

    tracing::debug!("Lock metrics described");
}

/// Outcome label values
pub mod outcome {
    pub const ACQUIRED: &str = "acquired";
    pub const CONTENDED: &str = "contended";
    pub const REENTRANT: &str = "reentrant";
    pub const RENEWED: &str = "renewed";
    pub const MISMATCH: &str = "mismatch";
    pub const RELEASED: &str = "released";
    pub const OWNERSHIP_LOST: &str = "ownership_lost";
    pub const NOT_HELD: &str = "not_held";
    pub const ERROR: &str = "error";
}

pub fn record_acquire(outcome: &'static str) {
    counter!(ACQUIRE_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_renewal(outcome: &'static str) {
    counter!(RENEW_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_release(outcome: &'static str) {
    counter!(RELEASE_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_held_duration(secs: f64) {
    histogram!(HELD_DURATION_SECONDS).record(secs);
}
