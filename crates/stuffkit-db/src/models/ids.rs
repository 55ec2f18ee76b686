use mongodb::bson::oid::ObjectId;

use crate::error::{DbError, DbResult};

pub fn new_mongo_id() -> ObjectId {
    ObjectId::new()
}

/// The all-zero id
pub fn empty_mongo_id() -> ObjectId {
    ObjectId::from_bytes([0; 12])
}

/// Parse a hex id, mapping malformed input to [`empty_mongo_id`].
pub fn convert_id(id: &str) -> ObjectId {
    match ObjectId::parse_str(id) {
        Ok(oid) => oid,
        Err(e) => {
            tracing::debug!(id = %id, error = %e, "Invalid object id, using empty id");
            empty_mongo_id()
        }
    }
}

pub fn try_convert_id(id: &str) -> DbResult<ObjectId> {
    ObjectId::parse_str(id).map_err(|e| DbError::InvalidObjectId(format!("{}: {}", id, e)))
}

pub fn convert_ids<S: AsRef<str>>(ids: &[S]) -> Vec<ObjectId> {
    ids.iter().map(|id| convert_id(id.as_ref())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "65a1b2c3d4e5f60718293a4b";

    #[test]
    fn test_convert_id_valid_hex() {
        assert_eq!(convert_id(HEX).to_hex(), HEX);
    }

    #[test]
    fn test_convert_id_invalid_is_empty() {
        assert_eq!(convert_id("not-an-id"), empty_mongo_id());
        assert_eq!(empty_mongo_id().to_hex(), "000000000000000000000000");
    }

    #[test]
    fn test_try_convert_id_reports_error() {
        assert!(matches!(
            try_convert_id("zz"),
            Err(DbError::InvalidObjectId(_))
        ));
    }

    #[test]
    fn test_convert_ids_keeps_positions() {
        let ids = convert_ids(&[HEX, "bad"]);
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0].to_hex(), HEX);
        assert_eq!(ids[1], empty_mongo_id());
    }

    #[test]
    fn test_new_ids_are_unique() {
        assert_ne!(new_mongo_id(), new_mongo_id());
    }
}
