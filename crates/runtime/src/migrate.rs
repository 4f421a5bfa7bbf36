use serde_json::Value;

use models::Pipeline;

use crate::{Database, Error};

/// MigrationManager executes the ordered aggregation pipelines of one
/// version transition. Pipelines are passed opaquely to the database; the
/// implementation supplies allowDiskUse and majority read/write concerns.
pub struct MigrationManager<'a> {
    db: &'a dyn Database,
}

impl<'a> MigrationManager<'a> {
    pub fn new(db: &'a dyn Database) -> Self {
        MigrationManager { db }
    }

    /// Run the pipeline at zero-based `position`. Failure carries the
    /// position, so operators can find the offending pipeline in the spec.
    pub async fn run(
        &self,
        collection: &str,
        position: usize,
        pipeline: &Pipeline,
    ) -> Result<(), Error> {
        self.db
            .aggregate(collection, pipeline)
            .await
            .map_err(|err| Error::MigrationFailed {
                pipeline: position,
                detail: err.to_string(),
            })?;

        tracing::info!(collection, pipeline = position, "ran migration pipeline");
        Ok(())
    }

    /// Whether the pipeline ends in a terminal write stage. A pipeline
    /// without one runs but writes nothing back, which is surfaced as an
    /// informational no-op event rather than an error.
    pub fn is_terminal_write(pipeline: &Pipeline) -> bool {
        pipeline
            .last()
            .and_then(Value::as_object)
            .is_some_and(|stage| stage.contains_key("$merge") || stage.contains_key("$out"))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mock::MockDatabase;
    use serde_json::json;

    #[tokio::test]
    async fn test_pipelines_run_in_order() {
        let db = MockDatabase::new();
        let manager = MigrationManager::new(&db);

        let first = vec![json!({"$addFields": {"a": 1}}), json!({"$merge": "users"})];
        let second = vec![json!({"$unset": "b"}), json!({"$merge": "users"})];

        manager.run("users", 0, &first).await.unwrap();
        manager.run("users", 1, &second).await.unwrap();

        assert_eq!(db.log(), vec!["aggregate/users/2", "aggregate/users/2"]);
    }

    #[tokio::test]
    async fn test_failure_carries_pipeline_position() {
        let db = MockDatabase::new();
        db.fail_once("aggregate/users/1");
        let manager = MigrationManager::new(&db);

        let err = manager
            .run("users", 3, &vec![json!({"$merge": "users"})])
            .await
            .unwrap_err();
        match err {
            Error::MigrationFailed { pipeline, .. } => assert_eq!(pipeline, 3),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_terminal_write_detection() {
        let merge = vec![json!({"$addFields": {"a": 1}}), json!({"$merge": "users"})];
        let out = vec![json!({"$out": "users"})];
        let bare = vec![json!({"$addFields": {"a": 1}})];
        let empty: Pipeline = Vec::new();

        assert!(MigrationManager::is_terminal_write(&merge));
        assert!(MigrationManager::is_terminal_write(&out));
        assert!(!MigrationManager::is_terminal_write(&bare));
        assert!(!MigrationManager::is_terminal_write(&empty));
    }
}
