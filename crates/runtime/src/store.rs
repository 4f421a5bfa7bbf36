use models::{Version, VersionRecord};

use crate::{Database, Error};

/// Default name of the dedicated collection holding version records.
pub const DEFAULT_VERSION_COLLECTION: &str = "mason_versions";

/// VersionStore reads and writes the per-collection current-version marker.
/// The write is only ever issued as the terminal step of a successful
/// transition.
pub struct VersionStore<'a> {
    db: &'a dyn Database,
    collection: &'a str,
}

impl<'a> VersionStore<'a> {
    pub fn new(db: &'a dyn Database, collection: &'a str) -> Self {
        VersionStore { db, collection }
    }

    /// Current version of `collection`. Zero records reads as the
    /// never-applied sentinel; more than one is corrupt and also reads as
    /// never-applied, with a warning.
    pub async fn read(&self, collection: &str) -> Result<Version, Error> {
        let records = self
            .db
            .find_version_records(self.collection, collection)
            .await?;

        match records.as_slice() {
            [record] => Ok(record.current_version),
            [] => Ok(Version::ZERO),
            _ => {
                tracing::warn!(
                    collection,
                    records = records.len(),
                    "multiple version records found; treating collection as never applied",
                );
                Ok(Version::ZERO)
            }
        }
    }

    /// Upsert `collection`'s record to `version`, keyed by collection name.
    pub async fn write(&self, collection: &str, version: Version) -> Result<(), Error> {
        let record = VersionRecord {
            collection_name: collection.to_string(),
            current_version: version,
        };
        self.db
            .upsert_version_record(self.collection, &record)
            .await
    }
}
