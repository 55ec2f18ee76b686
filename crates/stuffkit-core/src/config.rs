//! Configuration helpers
//!
//! Component configs are plain structs with a `from_env()` constructor. These
//! helpers keep the env parsing uniform: `.env` files are loaded once through
//! `dotenvy`, empty values count as unset, and malformed numbers fall back to
//! the default.

use std::env;
use std::str::FromStr;
use std::sync::Once;

static DOTENV: Once = Once::new();

/// Load `.env` into the process environment (first call only).
pub fn load_dotenv() {
    DOTENV.call_once(|| {
        dotenvy::dotenv().ok();
    });
}

/// Non-empty value of `key`, if any.
pub fn env_opt(key: &str) -> Option<String> {
    load_dotenv();
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

pub fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

/// Parse `key` into `T`, falling back to `default` when unset or malformed.
pub fn env_parse_or<T: FromStr>(key: &str, default: T) -> T {
    env_opt(key)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

pub fn env_bool(key: &str, default: bool) -> bool {
    match env_opt(key) {
        Some(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

/// Comma-separated list; blank entries are dropped.
pub fn env_list(key: &str) -> Vec<String> {
    env_opt(key)
        .map(|s| {
            s.split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

pub fn require_env(key: &str) -> Result<String, anyhow::Error> {
    env_opt(key).ok_or_else(|| anyhow::anyhow!("{} must be set", key))
}
