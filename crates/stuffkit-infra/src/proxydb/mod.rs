//! Proxy detection backed by an IP2Proxy BIN database
//!
//! The database file is read into memory by [`ProxyDbClient::open`]; lookups
//! never touch the disk.

mod reader;

use bytes::Bytes;
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use stuffkit_core::config::env_opt;
use stuffkit_core::{ErrorMetadata, LogLevel};
use thiserror::Error;

use reader::BinDatabase;

/// Country code of ranges that are not proxies
const NO_COUNTRY: &str = "-";

#[derive(Debug, Error)]
pub enum ProxyDbError {
    #[error("Database is not opened")]
    NotOpened,

    #[error("Failed to read database: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt database: {0}")]
    Corrupt(String),

    #[error("Invalid IPv4 address: {0}")]
    InvalidAddress(String),

    #[error("Not a proxy IP")]
    NotProxy,

    #[error("Invalid proxy type: {0}")]
    InvalidProxyType(String),
}

impl ErrorMetadata for ProxyDbError {
    fn error_code(&self) -> &'static str {
        match self {
            ProxyDbError::NotOpened => "PROXYDB_NOT_OPENED",
            ProxyDbError::Io(_) => "PROXYDB_IO_ERROR",
            ProxyDbError::Corrupt(_) => "PROXYDB_CORRUPT",
            ProxyDbError::InvalidAddress(_) => "PROXYDB_INVALID_ADDRESS",
            ProxyDbError::NotProxy => "PROXYDB_NOT_PROXY",
            ProxyDbError::InvalidProxyType(_) => "PROXYDB_INVALID_PROXY_TYPE",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }

    fn log_level(&self) -> LogLevel {
        match self {
            ProxyDbError::NotOpened | ProxyDbError::Io(_) | ProxyDbError::Corrupt(_) => {
                LogLevel::Error
            }
            _ => LogLevel::Debug,
        }
    }
}

/// Lookup result for a proxy address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyData {
    pub ip: String,
    /// One of `vpn`, `tor`, `dch`, `pub`, `web`
    pub proxy_type: String,
    pub country: String,
}

fn proxy_name(proxy_type: &str) -> Option<&'static str> {
    match proxy_type {
        "VPN" => Some("vpn"),
        "TOR" => Some("tor"),
        "DCH" => Some("dch"),
        "PUB" => Some("pub"),
        "WEB" => Some("web"),
        _ => None,
    }
}

/// IP2Proxy lookups against a BIN file
#[derive(Debug, Clone)]
pub struct ProxyDbClient {
    path: PathBuf,
    db: Option<BinDatabase>,
}

impl ProxyDbClient {
    /// Client for the database at `path`; call [`open`](Self::open) before lookups.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            db: None,
        }
    }

    /// Client for the file named by `PROXYDB_PATH`.
    pub fn from_env() -> Option<Self> {
        env_opt("PROXYDB_PATH").map(|path| Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.db.is_some()
    }

    /// Load the database. On failure the client stays closed.
    pub async fn open(&mut self) -> Result<(), ProxyDbError> {
        self.db = None;
        let data = tokio::fs::read(&self.path).await?;
        let db = BinDatabase::parse(Bytes::from(data))?;
        let (year, month, day) = db.date();
        tracing::info!(
            path = %self.path.display(),
            db_type = db.db_type(),
            build = %format!("20{:02}-{:02}-{:02}", year, month, day),
            "Proxy database opened"
        );
        self.db = Some(db);
        Ok(())
    }

    /// Proxy data for the dotted IPv4 address `ip`.
    ///
    /// Addresses outside every proxy range fail with [`ProxyDbError::NotProxy`].
    pub fn get_data(&self, ip: &str) -> Result<ProxyData, ProxyDbError> {
        let db = self.db.as_ref().ok_or(ProxyDbError::NotOpened)?;
        let addr = parse_ipv4(ip)?;

        let record = db.lookup_v4(addr)?.ok_or(ProxyDbError::NotProxy)?;
        if record.country_short.is_empty() || record.country_short == NO_COUNTRY {
            return Err(ProxyDbError::NotProxy);
        }
        let proxy_type = proxy_name(&record.proxy_type)
            .ok_or_else(|| ProxyDbError::InvalidProxyType(record.proxy_type.clone()))?;

        Ok(ProxyData {
            ip: ip.to_string(),
            proxy_type: proxy_type.to_string(),
            country: record.country_short,
        })
    }
}

/// IPv4, or an IPv4-mapped IPv6 address
fn parse_ipv4(ip: &str) -> Result<Ipv4Addr, ProxyDbError> {
    match ip.trim().parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => Ok(v4),
        Ok(IpAddr::V6(v6)) => v6
            .to_ipv4_mapped()
            .ok_or_else(|| ProxyDbError::InvalidAddress(ip.to_string())),
        Err(_) => Err(ProxyDbError::InvalidAddress(ip.to_string())),
    }
}
