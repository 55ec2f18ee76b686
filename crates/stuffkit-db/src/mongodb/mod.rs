//! MongoDB client bootstrap
//!
//! Builds a driver client from a flat config (hosts list, optional replica set,
//! optional credentials, read preference) and keeps a handle on the default
//! database.

mod client;

pub use client::{MongoClient, MongoConfig};
