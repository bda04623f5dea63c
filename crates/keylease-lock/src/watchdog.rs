//! Lease renewal daemon.
//!
//! One daemon is spawned per successful acquisition. Every half lease it
//! extends the lease if the store still holds this acquisition's token.
//! Renewal failures are logged and counted but never stop the loop; only a
//! stop request (or the handle going away) does.
//!
//! Stopping is a two-signal handshake: the releaser sends a stop request and
//! then waits for the daemon's acknowledgment. An in-flight renewal always
//! finishes before the acknowledgment, so a release that has seen the
//! acknowledgment can delete the lease without a renewal racing it.

use std::sync::Arc;
use std::time::Duration;

use keylease_store::{LeaseStore, with_timeout};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, warn};

use crate::metrics::{self, outcome};

/// What a renewal daemon needs to keep one lease alive
pub(crate) struct RenewalTarget<S: LeaseStore + ?Sized> {
    pub store: Arc<S>,
    pub key: String,
    pub token: String,
    pub lease_duration: Duration,
    pub renew_timeout: Duration,
}

/// Handle to a running renewal daemon
pub(crate) struct Watchdog {
    stop_tx: Option<oneshot::Sender<()>>,
    done_rx: oneshot::Receiver<()>,
    handle: JoinHandle<()>,
}

impl Watchdog {
    pub(crate) fn spawn<S>(target: RenewalTarget<S>) -> Self
    where
        S: LeaseStore + ?Sized + 'static,
    {
        let (stop_tx, stop_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();

        let interval = target.lease_duration / 2;
        debug!(key = %target.key, ?interval, "Starting lease renewal");
        let handle = tokio::spawn(run(target, stop_rx, done_tx));

        Self {
            stop_tx: Some(stop_tx),
            done_rx,
            handle,
        }
    }

    /// Ask the daemon to stop. Safe to call more than once.
    pub(crate) fn request_stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            // The daemon may already be gone; nothing to do then
            let _ = stop_tx.send(());
        }
    }

    /// Stop the daemon and wait up to `wait` for its acknowledgment.
    ///
    /// Returns `false` if the wait elapsed. The task is then aborted, and
    /// this only returns once it has been torn down.
    pub(crate) async fn stop(mut self, wait: Duration) -> bool {
        self.request_stop();

        // A dropped sender (panic, abort) resolves the receiver as well
        match tokio::time::timeout(wait, &mut self.done_rx).await {
            Ok(_) => true,
            Err(_) => {
                self.handle.abort();
                // Resolves after the task's future has been dropped
                let _ = (&mut self.handle).await;
                false
            }
        }
    }
}

async fn run<S>(
    target: RenewalTarget<S>,
    mut stop_rx: oneshot::Receiver<()>,
    done_tx: oneshot::Sender<()>,
) where
    S: LeaseStore + ?Sized,
{
    let period = target.lease_duration / 2;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            // Err means the handle was dropped without releasing
            _ = &mut stop_rx => break,
            _ = ticker.tick() => renew_once(&target).await,
        }
    }

    debug!(key = %target.key, "Lease renewal stopped");
    let _ = done_tx.send(());
}

async fn renew_once<S>(target: &RenewalTarget<S>)
where
    S: LeaseStore + ?Sized,
{
    let result = with_timeout(
        "compare_and_extend",
        target.renew_timeout,
        target
            .store
            .compare_and_extend(&target.key, &target.token, target.lease_duration),
    )
    .await;

    match result {
        Ok(true) => {
            debug!(key = %target.key, "Lease renewed");
            metrics::record_renewal(outcome::RENEWED);
        }
        Ok(false) => {
            warn!(key = %target.key, "Lease renewal skipped: token no longer matches");
            metrics::record_renewal(outcome::MISMATCH);
        }
        Err(e) => {
            warn!(key = %target.key, error = %e, "Lease renewal failed");
            metrics::record_renewal(outcome::ERROR);
        }
    }
}
