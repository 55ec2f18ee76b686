//! Redis clients
//!
//! Two flavours share one options struct:
//! - [`RedisClient`]: a single multiplexed connection managed by
//!   `redis::aio::ConnectionManager`, which reconnects with exponential backoff.
//! - [`RedisPool`]: a `bb8` pool of connections for callers that issue
//!   blocking-style commands concurrently (counters updated from many tasks).

mod client;
mod pool;

use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use std::time::Duration;
use stuffkit_core::config::{env_or, env_parse_or};

pub use client::RedisClient;
pub use pool::RedisPool;

/// Pool size used by [`RedisPool`] when `pool_size` is 0
pub const DEFAULT_POOL_SIZE: u32 = 15;

/// Connection options
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub host: String,
    pub port: u16,
    pub password: String,
    /// Reconnect attempts before a command fails
    pub max_retries: usize,
    pub min_retry_backoff: Duration,
    pub max_retry_backoff: Duration,
    /// Response timeout per command; zero disables it
    pub write_timeout: Duration,
    pub db: i64,
    pub pool_size: u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: String::new(),
            max_retries: 3,
            min_retry_backoff: Duration::from_millis(8),
            max_retry_backoff: Duration::from_millis(512),
            write_timeout: Duration::from_secs(3),
            db: 0,
            pool_size: 0,
        }
    }
}

impl ClientOptions {
    /// Read `REDIS_*` variables; durations are in milliseconds.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env_or("REDIS_HOST", &defaults.host),
            port: env_parse_or("REDIS_PORT", defaults.port),
            password: env_or("REDIS_PASSWORD", ""),
            max_retries: env_parse_or("REDIS_MAX_RETRIES", defaults.max_retries),
            min_retry_backoff: Duration::from_millis(env_parse_or(
                "REDIS_MIN_RETRY_BACKOFF_MS",
                defaults.min_retry_backoff.as_millis() as u64,
            )),
            max_retry_backoff: Duration::from_millis(env_parse_or(
                "REDIS_MAX_RETRY_BACKOFF_MS",
                defaults.max_retry_backoff.as_millis() as u64,
            )),
            write_timeout: Duration::from_millis(env_parse_or(
                "REDIS_WRITE_TIMEOUT_MS",
                defaults.write_timeout.as_millis() as u64,
            )),
            db: env_parse_or("REDIS_DB", defaults.db),
            pool_size: env_parse_or("REDIS_POOL_SIZE", defaults.pool_size),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connection info without going through a URL, so passwords need no escaping.
    pub fn connection_info(&self) -> ConnectionInfo {
        let mut redis = RedisConnectionInfo::default();
        redis.db = self.db;
        if !self.password.is_empty() {
            redis.password = Some(self.password.clone());
        }
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis,
        }
    }

    pub(crate) fn effective_pool_size(&self) -> u32 {
        if self.pool_size > 0 {
            self.pool_size
        } else {
            DEFAULT_POOL_SIZE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_info_without_password() {
        let opts = ClientOptions {
            host: "cache.internal".to_string(),
            port: 6380,
            db: 4,
            ..Default::default()
        };
        let info = opts.connection_info();
        assert!(matches!(
            info.addr,
            ConnectionAddr::Tcp(ref host, 6380) if host == "cache.internal"
        ));
        assert_eq!(info.redis.db, 4);
        assert!(info.redis.password.is_none());
        assert_eq!(opts.address(), "cache.internal:6380");
    }

    #[test]
    fn test_connection_info_keeps_raw_password() {
        let opts = ClientOptions {
            password: "p@ss:word/1".to_string(),
            ..Default::default()
        };
        assert_eq!(
            opts.connection_info().redis.password.as_deref(),
            Some("p@ss:word/1")
        );
    }

    #[test]
    fn test_effective_pool_size() {
        assert_eq!(ClientOptions::default().effective_pool_size(), DEFAULT_POOL_SIZE);
        let opts = ClientOptions {
            pool_size: 40,
            ..Default::default()
        };
        assert_eq!(opts.effective_pool_size(), 40);
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("REDIS_HOST", "redis.test");
        std::env::set_var("REDIS_PORT", "7000");
        std::env::set_var("REDIS_WRITE_TIMEOUT_MS", "250");
        std::env::set_var("REDIS_POOL_SIZE", "nope");
        let opts = ClientOptions::from_env();
        assert_eq!(opts.host, "redis.test");
        assert_eq!(opts.port, 7000);
        assert_eq!(opts.write_timeout, Duration::from_millis(250));
        assert_eq!(opts.pool_size, 0);
        std::env::remove_var("REDIS_HOST");
        std::env::remove_var("REDIS_PORT");
        std::env::remove_var("REDIS_WRITE_TIMEOUT_MS");
        std::env::remove_var("REDIS_POOL_SIZE");
    }
}
