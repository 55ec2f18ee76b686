//! Model helpers over MongoDB collections
//!
//! A [`Model`] names its collection and knows whether it has been persisted.
//! The free functions in this module cover the operations services repeat for
//! every collection: counting, finding with a 1 second server-side limit,
//! deleting, upserting with cache invalidation, and cache-aside reads keyed by
//! `"{table}::{id}"`.

mod ids;
mod ops;
mod query;

use async_trait::async_trait;
use mongodb::bson::Document;
use mongodb::options::Hint;
use mongodb::Database;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::ModelCache;
use crate::error::DbResult;

pub use ids::{convert_id, convert_ids, empty_mongo_id, new_mongo_id, try_convert_id};
pub use ops::{
    aggregate, cache_first, count_docs, delete_many, delete_one, find_all, find_by_id, find_one,
    find_one_with_opts, save, to_json, update_many,
};
pub use query::{aggregate_pipeline, cache_key, date_query, id_filter};

/// Contract every persisted document type implements
#[async_trait]
pub trait Model: Serialize + DeserializeOwned + Default + Unpin + Send + Sync + 'static {
    /// Collection name
    const TABLE: &'static str;

    /// True when the document has not been stored yet (no id assigned)
    fn is_empty(&self) -> bool;

    /// Load the document with `id`. Defaults to a lookup on `_id`.
    async fn find_one(db: &Database, id: &str) -> DbResult<Option<Self>> {
        find_by_id::<Self>(db, id).await
    }

    /// Drop any derived cache entries beyond the `"{table}::{id}"` one.
    async fn clear_cache_data(&self, _cache: &dyn ModelCache) -> DbResult<()> {
        Ok(())
    }
}

/// Additional find information
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub sort: Option<Document>,
    pub hint: Option<Hint>,
    pub limit: Option<i64>,
    pub skip: Option<u64>,
}

/// Options for [`aggregate`]
#[derive(Debug, Clone, Default)]
pub struct AggregateOpts {
    /// Field summed into `total` for every group
    pub sum_field: Option<String>,
    pub sort: Option<Document>,
    pub limit: Option<i64>,
}
