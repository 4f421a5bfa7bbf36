use std::collections::BTreeMap;

use indexmap::IndexMap;
use models::{EnumeratorSet, EnumeratorStatus, Errors};

/// EnumeratorRegistry indexes the loaded enumerator sets by their integer
/// version, which is the component a collection version's final field
/// selects.
pub struct EnumeratorRegistry<'a> {
    sets: BTreeMap<u32, &'a EnumeratorSet>,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("no enumerator set exists at version {version}")]
    UnknownVersion { version: u32 },
    #[error("enumerator {name:?} is not defined by the set at version {version}")]
    UnknownEnumerator { name: String, version: u32 },
}

impl<'a> EnumeratorRegistry<'a> {
    /// Index `sets`, recording a DuplicateEnumeratorSet error for every
    /// version declared more than once. The first declaration wins.
    pub fn new(sets: &'a [EnumeratorSet], errors: &mut Errors) -> Self {
        let mut index = BTreeMap::new();

        for set in sets {
            if index.contains_key(&set.version) {
                errors.push(
                    "data/enumerators.json",
                    models::ErrorKind::DuplicateEnumeratorSet,
                    format!("enumerator set version {} is declared more than once", set.version),
                );
            } else {
                index.insert(set.version, set);
            }
        }
        EnumeratorRegistry { sets: index }
    }

    /// Resolve `(name, version)` to the frozen value → description map whose
    /// keys become the `enum` list of rendered schemas.
    pub fn lookup(
        &self,
        name: &str,
        version: u32,
    ) -> Result<&'a IndexMap<String, String>, LookupError> {
        let set = self
            .sets
            .get(&version)
            .ok_or(LookupError::UnknownVersion { version })?;

        set.enumerators
            .get(name)
            .ok_or_else(|| LookupError::UnknownEnumerator {
                name: name.to_string(),
                version,
            })
    }

    /// Whether `name` is defined by any loaded set. Used when walking
    /// schemas referenced by no collection, where there is no version
    /// context to resolve against.
    pub fn is_known_name(&self, name: &str) -> bool {
        self.sets
            .values()
            .any(|set| set.enumerators.contains_key(name))
    }

    /// Status of the set at `version`, if one exists.
    pub fn status(&self, version: u32) -> Option<EnumeratorStatus> {
        self.sets.get(&version).map(|set| set.status)
    }
}
