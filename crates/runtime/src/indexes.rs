use models::IndexSpec;

use crate::database::index_key_document;
use crate::{Database, Error};

/// IndexManager drives index creation and deletion for one transition.
/// Creation probes by name first, so re-applying a version which already
/// created its indexes is a no-op rather than a conflict.
pub struct IndexManager<'a> {
    db: &'a dyn Database,
}

impl<'a> IndexManager<'a> {
    pub fn new(db: &'a dyn Database) -> Self {
        IndexManager { db }
    }

    /// Create `index`, returning false if an identical index already
    /// exists. A different index under the same name is an IndexConflict.
    pub async fn create(&self, collection: &str, index: &IndexSpec) -> Result<bool, Error> {
        if index.name.is_empty() || index.key.is_empty() {
            return Err(Error::IndexInvalid {
                name: index.name.clone(),
                detail: "an index requires a name and a non-empty key".to_string(),
            });
        }

        let existing = self.db.list_indexes(collection).await?;
        if let Some(existing) = existing.iter().find(|info| info.name == index.name) {
            if existing.key == index_key_document(index) {
                tracing::debug!(collection, index = %index.name, "index already exists; skipping");
                return Ok(false);
            }
            return Err(Error::IndexConflict {
                name: index.name.clone(),
            });
        }

        self.db.create_index(collection, index).await?;
        tracing::info!(collection, index = %index.name, "created index");
        Ok(true)
    }

    /// Drop the index named `name`, returning false if it was absent.
    /// Absence is the expected re-run path and is not an error.
    pub async fn drop(&self, collection: &str, name: &str) -> Result<bool, Error> {
        let existed = self.db.drop_index(collection, name).await?;
        if existed {
            tracing::info!(collection, index = name, "dropped index");
        } else {
            tracing::info!(collection, index = name, "index to drop was absent; skipping");
        }
        Ok(existed)
    }
}
