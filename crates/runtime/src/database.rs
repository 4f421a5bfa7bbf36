use futures::future::BoxFuture;
use serde_json::Value;

use models::{IndexSpec, VersionRecord};

use crate::Error;

/// One index as reported by the database, normalized for comparison with a
/// declared [`IndexSpec`].
#[derive(Clone, Debug, PartialEq)]
pub struct IndexInfo {
    pub name: String,
    pub key: Value,
    pub options: Value,
}

/// Database is the capability the engine consumes. Connection parameters
/// are injected into the implementation; the engine never sees them. All
/// schemas, pipelines and documents cross this seam as JSON values, and
/// implementations own any conversion to their wire format.
///
/// `aggregate` must run with allowDiskUse and majority read/write concerns.
/// `drop_index` resolves to Ok(false) when the index is absent, and
/// `create_index` is expected to fail with [`Error::IndexConflict`] when a
/// different index already occupies the requested name.
pub trait Database: Send + Sync {
    fn list_collections(&self) -> BoxFuture<'_, Result<Vec<String>, Error>>;

    fn get_validator<'a>(
        &'a self,
        collection: &'a str,
    ) -> BoxFuture<'a, Result<Option<Value>, Error>>;

    fn set_validator<'a>(
        &'a self,
        collection: &'a str,
        schema: &'a Value,
        level: &'a str,
        action: &'a str,
    ) -> BoxFuture<'a, Result<(), Error>>;

    fn clear_validator<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<(), Error>>;

    fn list_indexes<'a>(
        &'a self,
        collection: &'a str,
    ) -> BoxFuture<'a, Result<Vec<IndexInfo>, Error>>;

    fn create_index<'a>(
        &'a self,
        collection: &'a str,
        index: &'a IndexSpec,
    ) -> BoxFuture<'a, Result<(), Error>>;

    fn drop_index<'a>(
        &'a self,
        collection: &'a str,
        index_name: &'a str,
    ) -> BoxFuture<'a, Result<bool, Error>>;

    fn aggregate<'a>(
        &'a self,
        collection: &'a str,
        pipeline: &'a [Value],
    ) -> BoxFuture<'a, Result<(), Error>>;

    fn find_version_records<'a>(
        &'a self,
        store: &'a str,
        collection: &'a str,
    ) -> BoxFuture<'a, Result<Vec<VersionRecord>, Error>>;

    fn upsert_version_record<'a>(
        &'a self,
        store: &'a str,
        record: &'a VersionRecord,
    ) -> BoxFuture<'a, Result<(), Error>>;

    fn insert_many<'a>(
        &'a self,
        collection: &'a str,
        documents: &'a [Value],
    ) -> BoxFuture<'a, Result<(), Error>>;
}

/// The JSON key document of a declared index, in declared field order.
pub fn index_key_document(index: &IndexSpec) -> Value {
    let mut key = serde_json::Map::new();
    for (field, direction) in &index.key {
        let value = match direction {
            models::IndexKey::Direction(d) => Value::from(*d),
            models::IndexKey::Kind(kind) => Value::String(kind.clone()),
        };
        key.insert(field.clone(), value);
    }
    Value::Object(key)
}
