use serde::{Deserialize, Serialize};

use super::Version;

/// VersionRecord is the database-resident marker of a collection's current
/// version, kept in the dedicated version-store collection. Exactly one
/// record exists per processed collection; absence reads as `0.0.0.0`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct VersionRecord {
    pub collection_name: String,
    pub current_version: Version,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_record_round_trip() {
        let record = VersionRecord {
            collection_name: "users".to_string(),
            current_version: Version::new(1, 0, 0, 2),
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"collection_name": "users", "current_version": "1.0.0.2"})
        );
        assert_eq!(
            serde_json::from_value::<VersionRecord>(value).unwrap(),
            record
        );
    }
}
