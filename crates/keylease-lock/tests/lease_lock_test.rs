//! Lease lock protocol tests
//!
//! Mutual exclusion, failure handling, stop-before-delete ordering and the
//! staleness window of re-entrant acquire, against an instrumented store.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{Call, RecordingStore};
use keylease_lock::{LeaseLock, LockError, LockOptions, LockState, MemoryLeaseStore, StoreError};

const LEASE: Duration = Duration::from_millis(200);

fn lock_on(
    store: &Arc<RecordingStore>,
    resource: &str,
    options: LockOptions,
) -> LeaseLock<RecordingStore> {
    LeaseLock::new(Arc::clone(store), resource, options).expect("valid lock options")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_acquire_exactly_one_wins() {
    let store = Arc::new(MemoryLeaseStore::new());

    for round in 0..20 {
        let resource = format!("test-concurrent-{}", round);
        let lease = Duration::from_secs(5);
        let lock1 =
            Arc::new(LeaseLock::with_lease(Arc::clone(&store), resource.clone(), lease).unwrap());
        let lock2 = Arc::new(LeaseLock::with_lease(Arc::clone(&store), resource, lease).unwrap());

        let (a, b) = {
            let l1 = Arc::clone(&lock1);
            let l2 = Arc::clone(&lock2);
            let t1 = tokio::spawn(async move { l1.acquire().await });
            let t2 = tokio::spawn(async move { l2.acquire().await });
            (t1.await.unwrap().unwrap(), t2.await.unwrap().unwrap())
        };

        assert!(a ^ b, "expected exactly one winner, got {} and {}", a, b);

        let winner = if a { lock1 } else { lock2 };
        winner.release().await.unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn test_reentrant_acquire_skips_store() {
    let store = Arc::new(RecordingStore::new());
    let options = LockOptions::new(Duration::from_secs(5));
    let lock = lock_on(&store, "test-reentrant", options);

    assert!(lock.acquire().await.unwrap());
    assert!(lock.acquire().await.unwrap());
    assert_eq!(store.count(Call::Set), 1);

    lock.release().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_clean_release_lets_another_handle_in() {
    let store = Arc::new(RecordingStore::new());
    let first = lock_on(&store, "test-clean", LockOptions::new(LEASE));
    let second = lock_on(&store, "test-clean", LockOptions::new(LEASE));

    assert!(first.acquire().await.unwrap());
    first.release().await.unwrap();
    assert_eq!(store.inner.get("lock:test-clean"), None);

    assert!(second.acquire().await.unwrap());
    second.release().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_release_without_acquire_touches_nothing() {
    let store = Arc::new(RecordingStore::new());
    let lock = lock_on(&store, "test-not-held", LockOptions::new(LEASE));

    assert!(matches!(lock.release().await, Err(LockError::NotHeld)));
    assert!(store.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_precedes_delete() {
    let store = Arc::new(RecordingStore::new());
    let options = LockOptions::new(Duration::from_millis(20));
    let lock = lock_on(&store, "test-ordering", options);

    assert!(lock.acquire().await.unwrap());
    tokio::time::sleep(Duration::from_millis(55)).await;
    lock.release().await.unwrap();

    // Keep the clock moving in case anything is still scheduled
    tokio::time::sleep(Duration::from_millis(100)).await;

    let calls = store.calls();
    let delete_at = calls
        .iter()
        .position(|c| *c == Call::Delete)
        .expect("release issued a delete");

    assert!(
        calls[..delete_at].contains(&Call::Extend),
        "no renewal observed: {:?}",
        calls
    );
    assert!(
        !calls[delete_at..].contains(&Call::Extend),
        "renewal after delete: {:?}",
        calls
    );
}

#[tokio::test(start_paused = true)]
async fn test_acquire_store_failure() {
    let store = Arc::new(RecordingStore::new());
    store.faults.fail_set.store(true, Ordering::SeqCst);
    let lock = lock_on(&store, "test-acquire-failure", LockOptions::new(LEASE));

    let err = lock.acquire().await.unwrap_err();
    assert!(matches!(
        err,
        LockError::StoreUnavailable(StoreError::Backend(_))
    ));
    assert!(err.is_retryable());
    assert_eq!(lock.state().await, LockState::Unlocked);

    store.faults.fail_set.store(false, Ordering::SeqCst);
    assert!(lock.acquire().await.unwrap());
    lock.release().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_acquire_round_trip_timeout() {
    let store = Arc::new(RecordingStore::new());
    store.faults.stall_set.store(true, Ordering::SeqCst);
    let options = LockOptions::new(LEASE).with_op_timeout(Duration::from_millis(100));
    let lock = lock_on(&store, "test-acquire-timeout", options);

    let err = lock.acquire().await.unwrap_err();
    assert!(matches!(
        err,
        LockError::StoreUnavailable(StoreError::Timeout { operation: "set_if_absent", .. })
    ));
    assert!(!lock.is_held().await);
}

#[tokio::test(start_paused = true)]
async fn test_release_store_failure_keeps_lock_held() {
    let store = Arc::new(RecordingStore::new());
    let lock = lock_on(&store, "test-release-failure", LockOptions::new(LEASE));

    assert!(lock.acquire().await.unwrap());

    store.faults.fail_delete.store(true, Ordering::SeqCst);
    let err = lock.release().await.unwrap_err();
    assert!(matches!(err, LockError::StoreUnavailable(_)));
    assert_eq!(lock.state().await, LockState::Held);

    store.faults.fail_delete.store(false, Ordering::SeqCst);
    lock.release().await.unwrap();
    assert_eq!(lock.state().await, LockState::Unlocked);
    assert_eq!(store.inner.get("lock:test-release-failure"), None);
}

#[tokio::test(start_paused = true)]
async fn test_renewal_failures_do_not_stop_daemon() {
    let store = Arc::new(RecordingStore::new());
    store.faults.fail_extend.store(true, Ordering::SeqCst);
    let lock = lock_on(&store, "test-renew-failure", LockOptions::new(LEASE));

    assert!(lock.acquire().await.unwrap());

    // Ticks at 100, 200, 300, 400, 500ms all fail
    tokio::time::sleep(Duration::from_millis(550)).await;
    assert!(store.count(Call::Extend) >= 5);

    // The failures were never surfaced; the lease simply expired
    assert!(lock.is_held().await);
    assert_eq!(store.inner.get("lock:test-renew-failure"), None);

    let err = lock.release().await.unwrap_err();
    assert!(matches!(err, LockError::OwnershipLost { .. }));
    assert!(!lock.is_held().await);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_renewal_finishes_before_delete() {
    let store = Arc::new(RecordingStore::new());
    store.faults.stall_extend.store(true, Ordering::SeqCst);
    let options = LockOptions::new(Duration::from_secs(1))
        .with_renew_timeout(Duration::from_millis(200))
        .with_stop_timeout(Duration::from_millis(500));
    let lock = lock_on(&store, "test-stalled-renewal", options);

    assert!(lock.acquire().await.unwrap());

    // First renewal at 500ms hangs until its own 200ms bound
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(store.count(Call::Extend), 1);

    // Release waits for the renewal to give up, then deletes
    let started = tokio::time::Instant::now();
    lock.release().await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(store.inner.get("lock:test-stalled-renewal"), None);
    assert_eq!(store.calls(), vec![Call::Set, Call::Extend, Call::Delete]);
}

#[tokio::test(start_paused = true)]
async fn test_zero_stop_wait_is_rejected() {
    let store = Arc::new(RecordingStore::new());
    let options = LockOptions::new(LEASE).with_stop_timeout(Duration::ZERO);

    let result = LeaseLock::new(Arc::clone(&store), "test-zero-stop", options);
    assert!(matches!(result, Err(LockError::InvalidConfig(_))));
}

#[tokio::test(start_paused = true)]
async fn test_dropping_held_lock_stops_renewal() {
    let store = Arc::new(RecordingStore::new());
    let lock = lock_on(&store, "test-drop", LockOptions::new(LEASE));

    assert!(lock.acquire().await.unwrap());
    tokio::time::sleep(Duration::from_millis(250)).await;
    drop(lock);

    tokio::time::sleep(Duration::from_millis(10)).await;
    let renewals = store.count(Call::Extend);

    tokio::time::sleep(LEASE * 3).await;
    assert_eq!(store.count(Call::Extend), renewals);
    assert_eq!(store.inner.get("lock:test-drop"), None);
}

#[tokio::test(start_paused = true)]
async fn test_stale_handle_after_takeover() {
    let store = Arc::new(RecordingStore::new());
    store.faults.fail_extend.store(true, Ordering::SeqCst);
    let stale = lock_on(&store, "test-takeover", LockOptions::new(LEASE));
    let fresh = lock_on(&store, "test-takeover", LockOptions::new(LEASE));

    assert!(stale.acquire().await.unwrap());

    // Renewals fail, the lease runs out and someone else takes it
    tokio::time::sleep(LEASE + Duration::from_millis(50)).await;
    store.faults.fail_extend.store(false, Ordering::SeqCst);
    assert!(fresh.acquire().await.unwrap());
    let fresh_token = fresh.token().await;

    // The stale handle still believes it holds the lock
    assert!(stale.acquire().await.unwrap());

    // Its release cannot delete the new owner's lease
    assert!(matches!(
        stale.release().await,
        Err(LockError::OwnershipLost { .. })
    ));
    assert_eq!(store.inner.get("lock:test-takeover"), fresh_token);
    assert_eq!(stale.state().await, LockState::Unlocked);

    fresh.release().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_reacquire_after_release_uses_new_daemon() {
    let store = Arc::new(RecordingStore::new());
    let lock = lock_on(&store, "test-cycle", LockOptions::new(LEASE));

    for _ in 0..3 {
        assert!(lock.acquire().await.unwrap());
        tokio::time::sleep(LEASE * 2).await;
        assert_eq!(store.inner.get("lock:test-cycle"), lock.token().await);
        lock.release().await.unwrap();
    }

    let extends_after_cycles = store.count(Call::Extend);
    tokio::time::sleep(LEASE * 3).await;
    assert_eq!(store.count(Call::Extend), extends_after_cycles);
}
