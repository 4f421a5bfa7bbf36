use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Collection;

/// One aggregation pipeline: an ordered list of stage objects, passed
/// opaquely to the database's aggregate command.
pub type Pipeline = Vec<Value>;

/// CollectionConfig declares the successive schema versions of one
/// collection, as loaded from `collections/<name>.yaml`.
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CollectionConfig {
    /// # Name of the collection this configuration manages.
    pub name: Collection,
    /// # Successive declared versions, in ascending order.
    pub versions: Vec<VersionSpec>,
}

impl CollectionConfig {
    /// Build a root JSON schema for the CollectionConfig model.
    pub fn root_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(Self)
    }
}

/// VersionSpec is one declared version of a collection: the schema to
/// install, indexes to add or drop, and data migrations to run while
/// transitioning onto it.
///
/// `version` is kept as the raw authored string. The validation pass parses
/// it, so that a malformed version surfaces as one aggregated
/// `BadVersionString` error instead of failing the whole file load.
#[derive(Serialize, Deserialize, Clone, Debug, Default, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct VersionSpec {
    /// # Version string, `major.minor.patch.enumerators`.
    pub version: String,
    /// # Indexes created while transitioning onto this version.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add_indexes: Vec<IndexSpec>,
    /// # Names of indexes dropped while transitioning onto this version.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drop_indexes: Vec<String>,
    /// # Migration pipelines run while transitioning onto this version,
    /// in declared order. Each is a list of aggregation stages whose
    /// terminal stage is expected to write results back ($merge or $out).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregations: Vec<Pipeline>,
    /// # Name of a test-data file under data/, loaded only when the
    /// service is configured to load test data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_data: Option<String>,
}

impl VersionSpec {
    pub fn parsed_version(&self) -> Result<super::Version, super::BadVersion> {
        self.version.parse()
    }
}

/// IndexSpec declares one index: its name, ordered key document, and
/// opaque creation options (`unique`, `sparse`, and so on).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct IndexSpec {
    /// # Index name, unique per collection.
    pub name: String,
    /// # Ordered map of field name to direction (1 / -1) or kind ("text").
    pub key: IndexMap<String, IndexKey>,
    /// # Additional creation options, passed through opaquely.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub options: Value,
}

/// One entry of an index key document.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(untagged)]
pub enum IndexKey {
    /// Sort direction: 1 (ascending) or -1 (descending).
    Direction(i64),
    /// Named index kind, such as "text" or "hashed".
    Kind(String),
}
