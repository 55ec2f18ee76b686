use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Bson, DateTime as BsonDateTime, Document};

use super::{AggregateOpts, Model};

/// Object ids are 24 hex characters; anything else is matched as a raw string id.
const OBJECT_ID_HEX_LEN: usize = 24;

pub fn cache_key<M: Model>(id: &str) -> String {
    format!("{}::{}", M::TABLE, id)
}

/// `{"_id": ...}` filter, using an ObjectId for 24-character ids.
pub fn id_filter(id: &str) -> Document {
    if id.len() == OBJECT_ID_HEX_LEN {
        if let Ok(oid) = mongodb::bson::oid::ObjectId::parse_str(id) {
            return doc! { "_id": oid };
        }
    }
    doc! { "_id": id }
}

/// Inclusive range condition on a date field.
pub fn date_query(start: DateTime<Utc>, end: DateTime<Utc>) -> Document {
    doc! {
        "$gte": BsonDateTime::from_millis(start.timestamp_millis()),
        "$lte": BsonDateTime::from_millis(end.timestamp_millis()),
    }
}

/// `$match` then `$group` on `group_by` with a document count and an optional
/// sum, followed by the optional `$sort` and `$limit` stages.
///
/// Group keys use the field name with dots replaced by underscores, since
/// `$group` ids cannot contain dotted keys.
pub fn aggregate_pipeline(
    query: Document,
    group_by: &[&str],
    extra: Option<&AggregateOpts>,
) -> Vec<Document> {
    let group_id = if group_by.is_empty() {
        Bson::Null
    } else {
        let mut id = Document::new();
        for field in group_by {
            id.insert(field.replace('.', "_"), format!("${}", field));
        }
        Bson::Document(id)
    };

    let mut group = doc! {
        "_id": group_id,
        "count": { "$sum": 1 },
    };
    if let Some(sum_field) = extra.and_then(|e| e.sum_field.as_deref()) {
        group.insert("total", doc! { "$sum": format!("${}", sum_field) });
    }

    let mut pipeline = vec![doc! { "$match": query }, doc! { "$group": group }];
    if let Some(extra) = extra {
        if let Some(sort) = &extra.sort {
            pipeline.push(doc! { "$sort": sort.clone() });
        }
        if let Some(limit) = extra.limit {
            pipeline.push(doc! { "$limit": limit });
        }
    }
    pipeline
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Campaign {
        name: String,
    }

    #[async_trait::async_trait]
    impl Model for Campaign {
        const TABLE: &'static str = "campaigns";

        fn is_empty(&self) -> bool {
            self.name.is_empty()
        }
    }

    #[test]
    fn test_cache_key() {
        assert_eq!(cache_key::<Campaign>("42"), "campaigns::42");
    }

    #[test]
    fn test_id_filter_object_id_vs_string() {
        let oid_filter = id_filter("65a1b2c3d4e5f60718293a4b");
        assert!(matches!(oid_filter.get("_id"), Some(Bson::ObjectId(_))));

        let str_filter = id_filter("campaign-42");
        assert_eq!(str_filter.get_str("_id").unwrap(), "campaign-42");

        // 24 characters but not hex
        let odd = id_filter("zzzzzzzzzzzzzzzzzzzzzzzz");
        assert!(matches!(odd.get("_id"), Some(Bson::String(_))));
    }

    #[test]
    fn test_date_query_bounds() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap();
        let q = date_query(start, end);
        assert_eq!(
            q.get_datetime("$gte").unwrap().timestamp_millis(),
            start.timestamp_millis()
        );
        assert_eq!(
            q.get_datetime("$lte").unwrap().timestamp_millis(),
            end.timestamp_millis()
        );
    }

    #[test]
    fn test_aggregate_pipeline_full() {
        let opts = AggregateOpts {
            sum_field: Some("stats.clicks".to_string()),
            sort: Some(doc! { "total": -1 }),
            limit: Some(10),
        };
        let pipeline = aggregate_pipeline(doc! { "active": true }, &["country", "meta.os"], Some(&opts));
        assert_eq!(pipeline.len(), 4);
        assert_eq!(pipeline[0], doc! { "$match": { "active": true } });
        assert_eq!(
            pipeline[1],
            doc! {
                "$group": {
                    "_id": { "country": "$country", "meta_os": "$meta.os" },
                    "count": { "$sum": 1 },
                    "total": { "$sum": "$stats.clicks" },
                }
            }
        );
        assert_eq!(pipeline[2], doc! { "$sort": { "total": -1 } });
        assert_eq!(pipeline[3], doc! { "$limit": 10_i64 });
    }

    #[test]
    fn test_aggregate_pipeline_without_grouping() {
        let pipeline = aggregate_pipeline(Document::new(), &[], None);
        assert_eq!(pipeline.len(), 2);
        let group = pipeline[1].get_document("$group").unwrap();
        assert_eq!(group.get("_id"), Some(&Bson::Null));
        assert!(group.get("total").is_none());
    }
}
