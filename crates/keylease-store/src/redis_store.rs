//! Redis lease store.
//!
//! Acquisition is a plain `SET key token NX PX ttl`. Release and renewal are
//! Lua scripts so the ownership check and the mutation run as one atomic step
//! on the server.

use std::time::Duration;

use async_trait::async_trait;
use redis::Script;
use redis::aio::ConnectionManager;
use tracing::debug;

use crate::LeaseStore;
use crate::error::{Result, StoreError};

const COMPARE_AND_DELETE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

const COMPARE_AND_EXTEND_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("PEXPIRE", KEYS[1], ARGV[2])
else
    return 0
end
"#;

/// Lease store backed by a Redis server.
///
/// Cloning is cheap: clones share one multiplexed, auto-reconnecting connection.
#[derive(Clone)]
pub struct RedisLeaseStore {
    conn: ConnectionManager,
    delete_script: Script,
    extend_script: Script,
}

impl RedisLeaseStore {
    /// Open a managed connection to the given `redis://` URL
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        debug!(url = %url, "Connected lease store to redis");
        Ok(Self::from_connection(conn))
    }

    /// Wrap an existing connection manager
    pub fn from_connection(conn: ConnectionManager) -> Self {
        Self {
            conn,
            delete_script: Script::new(COMPARE_AND_DELETE_SCRIPT),
            extend_script: Script::new(COMPARE_AND_EXTEND_SCRIPT),
        }
    }
}

/// Redis rejects a zero `PX`, so sub-millisecond TTLs round up to 1 ms
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl LeaseStore for RedisLeaseStore {
    async fn set_if_absent(&self, key: &str, token: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await?;

        match reply.as_deref() {
            None => Ok(false),
            Some("OK") => Ok(true),
            Some(other) => Err(StoreError::UnexpectedReply(format!(
                "SET NX returned {other}"
            ))),
        }
    }

    async fn compare_and_delete(&self, key: &str, token: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let mut invocation = self.delete_script.key(key);
        invocation.arg(token);
        let deleted: i64 = invocation.invoke_async(&mut conn).await?;
        Ok(deleted > 0)
    }

    async fn compare_and_extend(&self, key: &str, token: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        let mut invocation = self.extend_script.key(key);
        invocation.arg(token).arg(ttl_millis(ttl));
        let extended: i64 = invocation.invoke_async(&mut conn).await?;
        Ok(extended > 0)
    }
}
