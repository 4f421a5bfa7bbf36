use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// EnumeratorSet is one versioned batch of named enumerations, loaded from
/// `data/enumerators.json`. A collection version's final (enumerator)
/// component selects the set whose integer `version` matches it.
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct EnumeratorSet {
    pub name: String,
    pub status: EnumeratorStatus,
    pub version: u32,
    /// # Named enumerations: enumeration name to a map of value → description.
    /// The values become the `enum` list of rendered schemas, in declared order.
    #[serde(default)]
    pub enumerators: IndexMap<String, IndexMap<String, String>>,
}

#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EnumeratorStatus {
    Active,
    Deprecated,
}
