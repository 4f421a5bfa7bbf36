use serde_json::Value;

use crate::{Database, Error};

/// Validation posture installed with every schema.
pub const VALIDATION_LEVEL: &str = "moderate";
pub const VALIDATION_ACTION: &str = "error";

/// SchemaApplier installs a rendered BSON schema as a collection's document
/// validator: any existing validator is removed first, then the new one is
/// installed with moderate/error posture.
pub struct SchemaApplier<'a> {
    db: &'a dyn Database,
}

impl<'a> SchemaApplier<'a> {
    pub fn new(db: &'a dyn Database) -> Self {
        SchemaApplier { db }
    }

    /// Remove any existing validator. Absence is not an error.
    pub async fn clear(&self, collection: &str) -> Result<(), Error> {
        self.db.clear_validator(collection).await?;
        tracing::debug!(collection, "cleared validator");
        Ok(())
    }

    /// Install `schema` as the collection's validator.
    pub async fn apply(&self, collection: &str, schema: &Value) -> Result<(), Error> {
        self.db
            .set_validator(collection, schema, VALIDATION_LEVEL, VALIDATION_ACTION)
            .await?;
        tracing::info!(collection, "installed validator");
        Ok(())
    }
}
