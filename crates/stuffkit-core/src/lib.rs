//! Stuffkit Core Library
//!
//! This crate provides the small pieces shared by every stuffkit component:
//! - Error classification (`ErrorMetadata`, `LogLevel`) and the core error type
//! - Environment configuration helpers
//! - HMAC JWT parsing
//! - SQL literal escaping
//! - Cache key joining

pub mod config;
pub mod error;
pub mod jwt;
pub mod keys;
pub mod sql;

// Re-export commonly used types
pub use error::{CoreError, ErrorMetadata, LogLevel};
pub use jwt::Claims;
pub use keys::{join_key_parts, string_join};
pub use sql::{add_slashes, wrap_int_arr_value, wrap_str_arr_value, wrap_str_value};
