use lazy_static::lazy_static;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

lazy_static! {
    // COLLECTION_RE is the allowed shape of a collection slug.
    pub static ref COLLECTION_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]{2,64}$").unwrap();
}

/// Collection names a configured collection of the database.
/// It is deserialized leniently; the validation pass rejects names which
/// don't match [`COLLECTION_RE`], so that a bad name surfaces as one
/// aggregated error rather than a file-level parse failure.
#[derive(
    Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
pub struct Collection(String);

impl Collection {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
    pub fn is_valid(&self) -> bool {
        COLLECTION_RE.is_match(&self.0)
    }
}

impl std::ops::Deref for Collection {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Collection {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
