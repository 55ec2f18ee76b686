//! Stuffkit Database Library
//!
//! This crate provides the data-store adapters shared by stuffkit services:
//! - MongoDB client bootstrap (`mongodb`)
//! - Model helpers over MongoDB collections with cache-aside reads (`models`)
//! - Redis clients, multiplexed and pooled (`redis`)
//! - The `ModelCache` abstraction with in-memory and Redis backends (`cache`)

pub mod cache;
pub mod error;

#[cfg(feature = "mongodb")]
pub mod models;
#[cfg(feature = "mongodb")]
pub mod mongodb;

#[cfg(feature = "redis")]
pub mod redis;

// Re-export commonly used types
pub use cache::{MemoryCache, ModelCache};
pub use error::{DbError, DbResult};

#[cfg(feature = "redis")]
pub use cache::RedisCache;

#[cfg(feature = "mongodb")]
pub use self::mongodb::{MongoClient, MongoConfig};
#[cfg(feature = "mongodb")]
pub use models::{AggregateOpts, FindOptions, Model};

#[cfg(feature = "redis")]
pub use self::redis::{ClientOptions, RedisClient, RedisPool};
