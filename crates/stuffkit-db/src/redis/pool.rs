use bb8::{Pool, PooledConnection};
use bb8_redis::RedisConnectionManager;
use redis::FromRedisValue;

use super::ClientOptions;
use crate::error::{DbError, DbResult};

/// Pooled Redis client
///
/// Each command checks a connection out of a `bb8` pool sized by
/// `ClientOptions::pool_size` (15 when unset).
#[derive(Clone)]
pub struct RedisPool {
    pool: Pool<RedisConnectionManager>,
    address: String,
}

impl RedisPool {
    pub async fn new(opts: &ClientOptions) -> DbResult<Self> {
        let manager = RedisConnectionManager::new(opts.connection_info())?;
        let mut builder = Pool::builder().max_size(opts.effective_pool_size());
        if !opts.write_timeout.is_zero() {
            builder = builder.connection_timeout(opts.write_timeout);
        }
        let pool = builder.build(manager).await?;

        tracing::info!(
            address = %opts.address(),
            pool_size = opts.effective_pool_size(),
            "Redis pool created"
        );
        Ok(Self {
            pool,
            address: opts.address(),
        })
    }

    async fn conn(&self) -> DbResult<PooledConnection<'_, RedisConnectionManager>> {
        self.pool
            .get()
            .await
            .map_err(|e| DbError::Pool(e.to_string()))
    }

    async fn query<T: FromRedisValue>(&self, cmd: &redis::Cmd) -> DbResult<T> {
        let mut conn = self.conn().await?;
        let value = cmd.query_async(&mut *conn).await?;
        Ok(value)
    }

    pub async fn hincr_by(&self, key: &str, field: &str, incr: i64) -> DbResult<i64> {
        self.query(redis::cmd("HINCRBY").arg(key).arg(field).arg(incr))
            .await
    }

    pub async fn hincr_by_float(&self, key: &str, field: &str, incr: f64) -> DbResult<f64> {
        self.query(redis::cmd("HINCRBYFLOAT").arg(key).arg(field).arg(incr))
            .await
    }

    pub async fn hget(&self, key: &str, field: &str) -> DbResult<Option<String>> {
        self.query(redis::cmd("HGET").arg(key).arg(field)).await
    }

    pub async fn scard(&self, key: &str) -> DbResult<i64> {
        self.query(redis::cmd("SCARD").arg(key)).await
    }

    pub async fn srem<S: AsRef<str>>(&self, key: &str, members: &[S]) -> DbResult<i64> {
        let mut cmd = redis::cmd("SREM");
        cmd.arg(key);
        for member in members {
            cmd.arg(member.as_ref());
        }
        self.query(&cmd).await
    }

    pub async fn sismember(&self, key: &str, member: &str) -> DbResult<bool> {
        self.query(redis::cmd("SISMEMBER").arg(key).arg(member))
            .await
    }

    pub async fn sadd<S: AsRef<str>>(&self, key: &str, members: &[S]) -> DbResult<i64> {
        let mut cmd = redis::cmd("SADD");
        cmd.arg(key);
        for member in members {
            cmd.arg(member.as_ref());
        }
        self.query(&cmd).await
    }

    pub async fn srandmember(&self, key: &str) -> DbResult<Option<String>> {
        self.query(redis::cmd("SRANDMEMBER").arg(key)).await
    }

    /// Drop the pool; idle connections close with it.
    pub fn close(self) {
        tracing::info!(address = %self.address, "Redis pool closed");
    }
}
