//! Shared test store: a `MemoryLeaseStore` that records every call and can
//! be told to fail or stall individual operations.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use keylease_store::{LeaseStore, MemoryLeaseStore, Result, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Set,
    Extend,
    Delete,
}

#[derive(Default)]
pub struct Faults {
    pub fail_set: AtomicBool,
    pub fail_extend: AtomicBool,
    pub fail_delete: AtomicBool,
    pub stall_set: AtomicBool,
    pub stall_extend: AtomicBool,
}

#[derive(Default)]
pub struct RecordingStore {
    pub inner: MemoryLeaseStore,
    pub faults: Faults,
    calls: Mutex<Vec<Call>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn check(flag: &AtomicBool) -> Result<()> {
    if flag.load(Ordering::SeqCst) {
        Err(StoreError::Backend("injected failure".to_string()))
    } else {
        Ok(())
    }
}

async fn stall_if(flag: &AtomicBool) {
    if flag.load(Ordering::SeqCst) {
        std::future::pending::<()>().await;
    }
}

#[async_trait]
impl LeaseStore for RecordingStore {
    async fn set_if_absent(&self, key: &str, token: &str, ttl: Duration) -> Result<bool> {
        self.record(Call::Set);
        stall_if(&self.faults.stall_set).await;
        check(&self.faults.fail_set)?;
        self.inner.set_if_absent(key, token, ttl).await
    }

    async fn compare_and_delete(&self, key: &str, token: &str) -> Result<bool> {
        self.record(Call::Delete);
        check(&self.faults.fail_delete)?;
        self.inner.compare_and_delete(key, token).await
    }

    async fn compare_and_extend(&self, key: &str, token: &str, ttl: Duration) -> Result<bool> {
        self.record(Call::Extend);
        stall_if(&self.faults.stall_extend).await;
        check(&self.faults.fail_extend)?;
        self.inner.compare_and_extend(key, token, ttl).await
    }
}
