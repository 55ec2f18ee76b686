use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client};
use std::collections::HashMap;
use std::time::Duration;

use super::ClientOptions;
use crate::error::DbResult;

/// Multiplexed Redis client
///
/// Clones share the underlying connection; the manager reconnects in the
/// background after the connection drops.
#[derive(Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
    address: String,
}

impl RedisClient {
    pub async fn new(opts: &ClientOptions) -> DbResult<Self> {
        let client = Client::open(opts.connection_info())?;
        let conn = ConnectionManager::new_with_config(client, manager_config(opts)).await?;

        tracing::info!(address = %opts.address(), db = opts.db, "Redis client connected");
        Ok(Self {
            conn,
            address: opts.address(),
        })
    }

    /// Handle to the managed connection for commands not wrapped here
    pub fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }

    pub async fn hincr_by(&self, key: &str, field: &str, incr: i64) -> DbResult<i64> {
        Ok(self.conn.clone().hincr(key, field, incr).await?)
    }

    pub async fn sismember(&self, key: &str, member: &str) -> DbResult<bool> {
        Ok(self.conn.clone().sismember(key, member).await?)
    }

    /// Add `members` to the set; returns how many were new.
    pub async fn sadd<S: AsRef<str>>(&self, key: &str, members: &[S]) -> DbResult<i64> {
        let members: Vec<&str> = members.iter().map(AsRef::as_ref).collect();
        Ok(self.conn.clone().sadd(key, members).await?)
    }

    pub async fn srandmember(&self, key: &str) -> DbResult<Option<String>> {
        Ok(self.conn.clone().srandmember(key).await?)
    }

    pub async fn scard(&self, key: &str) -> DbResult<i64> {
        Ok(self.conn.clone().scard(key).await?)
    }

    pub async fn srem<S: AsRef<str>>(&self, key: &str, members: &[S]) -> DbResult<i64> {
        let members: Vec<&str> = members.iter().map(AsRef::as_ref).collect();
        Ok(self.conn.clone().srem(key, members).await?)
    }

    pub async fn hgetall(&self, key: &str) -> DbResult<HashMap<String, String>> {
        Ok(self.conn.clone().hgetall(key).await?)
    }

    pub async fn hget(&self, key: &str, field: &str) -> DbResult<Option<String>> {
        Ok(self.conn.clone().hget(key, field).await?)
    }

    pub async fn del(&self, key: &str) -> DbResult<i64> {
        Ok(self.conn.clone().del(key).await?)
    }

    /// Delete several keys in one command; no round trip for an empty list.
    pub async fn del_multi<S: AsRef<str>>(&self, keys: &[S]) -> DbResult<i64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let keys: Vec<&str> = keys.iter().map(AsRef::as_ref).collect();
        Ok(self.conn.clone().del(keys).await?)
    }

    pub async fn get(&self, key: &str) -> DbResult<Option<String>> {
        Ok(self.conn.clone().get(key).await?)
    }

    /// SET with an expiry, rounded up to whole seconds.
    pub async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> DbResult<()> {
        let seconds = ttl_seconds(ttl);
        let _: () = self.conn.clone().set_ex(key, value, seconds).await?;
        Ok(())
    }

    /// Release this handle. The connection closes once every clone is dropped.
    pub fn close(self) {
        tracing::info!(address = %self.address, "Redis client closed");
    }
}

fn manager_config(opts: &ClientOptions) -> ConnectionManagerConfig {
    let mut config = ConnectionManagerConfig::new();
    if opts.max_retries > 0 {
        config = config.set_number_of_retries(opts.max_retries);
    }
    if !opts.min_retry_backoff.is_zero() {
        config = config.set_factor(opts.min_retry_backoff.as_millis() as u64);
    }
    if !opts.max_retry_backoff.is_zero() {
        config = config.set_max_delay(opts.max_retry_backoff.as_millis() as u64);
    }
    if !opts.write_timeout.is_zero() {
        config = config
            .set_response_timeout(opts.write_timeout)
            .set_connection_timeout(opts.write_timeout);
    }
    config
}

fn ttl_seconds(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 || secs == 0 {
        secs + 1
    } else {
        secs
    }
}
