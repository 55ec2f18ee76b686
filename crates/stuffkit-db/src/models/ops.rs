use futures::{StreamExt, TryStreamExt};
use mongodb::bson::{doc, to_document, Document};
use mongodb::options::{
    CountOptions, FindOneOptions, FindOptions as DriverFindOptions, UpdateOptions,
};
use mongodb::{Collection, Database};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

use super::query::{aggregate_pipeline, cache_key, id_filter};
use super::{AggregateOpts, FindOptions, Model};
use crate::cache::ModelCache;
use crate::error::DbResult;

/// Server-side time limit for read operations
const READ_MAX_TIME: Duration = Duration::from_secs(1);

fn collection<M: Model>(db: &Database) -> Collection<M> {
    db.collection::<M>(M::TABLE)
}

pub async fn count_docs<M: Model>(db: &Database, query: Document) -> DbResult<u64> {
    let mut options = CountOptions::default();
    options.max_time = Some(READ_MAX_TIME);
    let count = collection::<M>(db)
        .count_documents(query)
        .with_options(options)
        .await?;
    Ok(count)
}

/// Group the matching documents of `M`'s collection. See
/// [`aggregate_pipeline`](super::aggregate_pipeline) for the stages.
pub async fn aggregate<M: Model>(
    db: &Database,
    query: Document,
    group_by: &[&str],
    extra: Option<&AggregateOpts>,
) -> DbResult<Vec<Document>> {
    let pipeline = aggregate_pipeline(query, group_by, extra);
    let cursor = db
        .collection::<Document>(M::TABLE)
        .aggregate(pipeline)
        .await?;
    Ok(cursor.try_collect().await?)
}

/// JSON encoding of a model; empty string when it cannot be encoded.
pub fn to_json<T: Serialize>(model: &T) -> String {
    serde_json::to_string(model).unwrap_or_default()
}

pub async fn find_one<M: Model>(db: &Database, query: Document) -> DbResult<Option<M>> {
    find_one_with_opts(db, query, None).await
}

/// Like [`find_one`] with sort, hint and skip applied. `limit` is ignored.
pub async fn find_one_with_opts<M: Model>(
    db: &Database,
    query: Document,
    query_opts: Option<&FindOptions>,
) -> DbResult<Option<M>> {
    let mut options = FindOneOptions::default();
    options.max_time = Some(READ_MAX_TIME);
    if let Some(opts) = query_opts {
        options.sort = opts.sort.clone();
        options.hint = opts.hint.clone();
        options.skip = opts.skip;
    }
    let found = collection::<M>(db)
        .find_one(query)
        .with_options(options)
        .await?;
    Ok(found)
}

pub async fn find_by_id<M: Model>(db: &Database, id: &str) -> DbResult<Option<M>> {
    find_one(db, id_filter(id)).await
}

/// All documents matching `query`. Documents that fail to decode are skipped.
pub async fn find_all<M: Model>(
    db: &Database,
    query: Document,
    query_opts: Option<&FindOptions>,
) -> DbResult<Vec<M>> {
    let mut options = DriverFindOptions::default();
    options.max_time = Some(READ_MAX_TIME);
    if let Some(opts) = query_opts {
        options.sort = opts.sort.clone();
        options.hint = opts.hint.clone();
        options.limit = opts.limit;
        options.skip = opts.skip;
    }

    let mut cursor = collection::<M>(db).find(query).with_options(options).await?;
    let mut results = Vec::new();
    while let Some(item) = cursor.next().await {
        match item {
            Ok(model) => results.push(model),
            Err(e) => {
                tracing::debug!(table = M::TABLE, error = %e, "Skipping undecodable document");
            }
        }
    }
    Ok(results)
}

/// Delete one matching document; returns the number deleted.
pub async fn delete_one<M: Model>(db: &Database, query: Document) -> DbResult<u64> {
    let result = collection::<M>(db).delete_one(query).await?;
    Ok(result.deleted_count)
}

pub async fn delete_many<M: Model>(db: &Database, query: Document) -> DbResult<u64> {
    let result = collection::<M>(db).delete_many(query).await?;
    Ok(result.deleted_count)
}

/// Insert `model` when it is empty, otherwise upsert it by `id` with `$set`.
///
/// The `"{table}::{id}"` entry and the model's own derived entries are
/// cleared whether or not the write succeeded.
pub async fn save<M: Model>(
    db: &Database,
    cache: &dyn ModelCache,
    model: &M,
    id: &str,
) -> DbResult<()> {
    let write = write_model(db, model, id).await;

    let key = cache_key::<M>(id);
    if let Err(e) = cache.delete(&key).await {
        tracing::warn!(key = %key, error = %e, "Failed to clear model cache entry");
    }
    if let Err(e) = model.clear_cache_data(cache).await {
        tracing::warn!(table = M::TABLE, error = %e, "Failed to clear derived cache data");
    }

    write
}

async fn write_model<M: Model>(db: &Database, model: &M, id: &str) -> DbResult<()> {
    let coll = collection::<M>(db);
    if model.is_empty() {
        coll.insert_one(model).await?;
    } else {
        let mut options = UpdateOptions::default();
        options.upsert = Some(true);
        let update = doc! { "$set": to_document(model)? };
        coll.update_one(id_filter(id), update)
            .with_options(options)
            .await?;
    }
    Ok(())
}

/// Apply `update` to every document matching `query`; returns the modified count.
pub async fn update_many<M: Model>(
    db: &Database,
    query: Document,
    update: Document,
) -> DbResult<u64> {
    let result = collection::<M>(db).update_many(query, update).await?;
    Ok(result.modified_count)
}

/// Cache-aside read: serve `"{table}::{id}"` from `cache`, otherwise load
/// through [`Model::find_one`] and populate the cache.
pub async fn cache_first<M: Model>(
    cache: &dyn ModelCache,
    db: &Database,
    id: &str,
) -> DbResult<Option<M>> {
    let key = cache_key::<M>(id);
    cache_aside(cache, &key, || M::find_one(db, id)).await
}

/// A failed or undecodable cache read falls through to `load`; only found
/// values are cached.
pub(crate) async fn cache_aside<T, F, Fut>(
    cache: &dyn ModelCache,
    key: &str,
    load: F,
) -> DbResult<Option<T>>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = DbResult<Option<T>>>,
{
    match cache.get_raw(key).await {
        Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
            Ok(value) => return Ok(Some(value)),
            Err(e) => tracing::debug!(key = %key, error = %e, "Discarding undecodable cache entry"),
        },
        Ok(None) => {}
        Err(e) => tracing::warn!(key = %key, error = %e, "Cache lookup failed, reading from database"),
    }

    let loaded = load().await?;
    if let Some(value) = &loaded {
        match serde_json::to_string(value) {
            Ok(raw) => {
                if let Err(e) = cache.set_raw(key, raw).await {
                    tracing::warn!(key = %key, error = %e, "Failed to populate cache");
                }
            }
            Err(e) => tracing::debug!(key = %key, error = %e, "Value not cacheable"),
        }
    }
    Ok(loaded)
}
