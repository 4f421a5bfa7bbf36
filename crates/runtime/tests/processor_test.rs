use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use dictionary::{Context, EnumeratorRegistry};
use models::{Errors, Version, VersionRecord};
use runtime::mock::MockDatabase;
use runtime::{Operation, Options, Processor, Status, DEFAULT_VERSION_COLLECTION};
use sources::Sources;

fn users_fixture() -> Sources {
    let sources = Sources::from_fixture(&json!({
        "collections/users.yaml": {
            "name": "users",
            "versions": [
                {
                    "version": "1.0.0.1",
                    "add_indexes": [
                        {"name": "nameIdx", "key": {"userName": 1}, "options": {"unique": true}},
                        {"name": "statusIdx", "key": {"status": 1}},
                    ],
                },
                {
                    "version": "1.0.0.2",
                    "drop_indexes": ["statusIdx"],
                },
            ],
        },
        "dictionary/users.1.0.0.yaml": {
            "type": "object",
            "properties": {
                "userName": {"type": "word", "description": "Login name", "required": true},
                "status": {"type": "enum", "enums": "user_status", "description": "Account status"},
            },
        },
        "dictionary/types/word.yaml": {"schema": {"type": "string", "maxLength": 40}},
        "data/enumerators.json": [
            {"name": "Enumerations", "status": "active", "version": 1, "enumerators": {
                "user_status": {"active": "Active account"},
            }},
            {"name": "Enumerations", "status": "active", "version": 2, "enumerators": {
                "user_status": {"active": "Active account", "archived": "Archived account"},
            }},
        ],
    }));
    assert!(sources.errors.is_empty(), "{:?}", sources.errors);
    sources
}

fn rendered_bson(sources: &Sources, collection: &str, version: Version) -> Value {
    let mut errors = Errors::new();
    let registry = EnumeratorRegistry::new(&sources.enumerators, &mut errors);
    let ctx = Context {
        registry: &registry,
        types: &sources.types,
        schemas: &sources.schemas,
        enumerator_version: Some(version.enumerators),
    };
    let stem = format!("{collection}.{}", version.schema_suffix());
    let resolved = ctx.resolve_file(&stem, &mut errors).unwrap();
    assert!(errors.is_empty(), "{errors:?}");
    dictionary::render_bson_schema(&resolved)
}

#[tokio::test]
async fn test_cold_start_two_versions() {
    let sources = users_fixture();
    let db = MockDatabase::new();
    let processor = Processor::new(&db, Options::default());

    let reports = processor.run_all(&sources, &CancellationToken::new()).await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].status, Status::Ok);

    // The version store records the latest declared version.
    assert_eq!(
        db.version_records(DEFAULT_VERSION_COLLECTION),
        vec![VersionRecord {
            collection_name: "users".to_string(),
            current_version: Version::new(1, 0, 0, 2),
        }]
    );

    // nameIdx survives; statusIdx was dropped by the second transition.
    let collection = db.collection("users").unwrap();
    assert!(collection.indexes.contains_key("nameIdx"));
    assert!(!collection.indexes.contains_key("statusIdx"));

    // The installed validator is the rendered BSON schema of 1.0.0.2.
    assert_eq!(
        collection.validator.unwrap(),
        rendered_bson(&sources, "users", Version::new(1, 0, 0, 2))
    );
}

#[tokio::test]
async fn test_resume_after_failure() {
    let sources = users_fixture();
    let db = MockDatabase::new();
    db.fail_once("create_index/users/nameIdx");

    let processor = Processor::new(&db, Options::default());

    // First run: index creation fails, nothing is persisted.
    let reports = processor.run_all(&sources, &CancellationToken::new()).await;
    assert_eq!(reports[0].status, Status::Failed);
    assert_eq!(reports[0].failed_version.as_deref(), Some("1.0.0.1"));
    assert_eq!(reports[0].failed_step.as_deref(), Some("add_indexes"));
    assert!(db.version_records(DEFAULT_VERSION_COLLECTION).is_empty());
    assert_eq!(db.collection("users").unwrap().validator, None);

    // Second run: the failure is gone and the end state matches a clean
    // cold start.
    let reports = processor.run_all(&sources, &CancellationToken::new()).await;
    assert_eq!(reports[0].status, Status::Ok);
    assert_eq!(
        db.version_records(DEFAULT_VERSION_COLLECTION),
        vec![VersionRecord {
            collection_name: "users".to_string(),
            current_version: Version::new(1, 0, 0, 2),
        }]
    );
    let collection = db.collection("users").unwrap();
    assert!(collection.indexes.contains_key("nameIdx"));
    assert!(!collection.indexes.contains_key("statusIdx"));
    assert_eq!(
        collection.validator.unwrap(),
        rendered_bson(&sources, "users", Version::new(1, 0, 0, 2))
    );
}

#[tokio::test]
async fn test_migration_with_merge() {
    let sources = Sources::from_fixture(&json!({
        "collections/users.yaml": {
            "name": "users",
            "versions": [{
                "version": "1.0.1.3",
                "aggregations": [[
                    {"$addFields": {"full_name": "$userName"}},
                    {"$unset": "userName"},
                    {"$merge": {"into": "users", "whenMatched": "replace"}},
                ]],
            }],
        },
        "dictionary/users.1.0.1.yaml": {
            "type": "object",
            "properties": {
                "full_name": {"type": "word", "description": "Display name", "required": true},
            },
        },
        "dictionary/types/word.yaml": {"schema": {"type": "string"}},
        "data/enumerators.json": [
            {"name": "Enumerations", "status": "active", "version": 3, "enumerators": {}},
        ],
    }));
    assert!(sources.errors.is_empty(), "{:?}", sources.errors);

    let db = MockDatabase::new();
    db.insert_documents(
        "users",
        vec![
            json!({"_id": 1, "userName": "a b"}),
            json!({"_id": 2, "userName": "c d"}),
        ],
    );
    db.script_aggregate_result(
        "users",
        vec![
            json!({"_id": 1, "full_name": "a b"}),
            json!({"_id": 2, "full_name": "c d"}),
        ],
    );

    let processor = Processor::new(&db, Options::default());
    let reports = processor.run_all(&sources, &CancellationToken::new()).await;
    assert_eq!(reports[0].status, Status::Ok);

    assert_eq!(
        db.collection("users").unwrap().documents,
        vec![
            json!({"_id": 1, "full_name": "a b"}),
            json!({"_id": 2, "full_name": "c d"}),
        ]
    );
    assert_eq!(
        db.version_records(DEFAULT_VERSION_COLLECTION),
        vec![VersionRecord {
            collection_name: "users".to_string(),
            current_version: Version::new(1, 0, 1, 3),
        }]
    );
}

#[tokio::test]
async fn test_rerun_is_a_pure_no_op() {
    let sources = users_fixture();
    let db = MockDatabase::new();
    let processor = Processor::new(&db, Options::default());

    let reports = processor.run_all(&sources, &CancellationToken::new()).await;
    assert_eq!(reports[0].status, Status::Ok);

    db.clear_log();
    let reports = processor.run_all(&sources, &CancellationToken::new()).await;
    assert_eq!(reports[0].status, Status::Ok);
    assert!(reports[0].operations.is_empty());

    // The second run performed idempotent reads only.
    for entry in db.log() {
        assert!(
            entry.starts_with("find_version_records/"),
            "unexpected write {entry:?}",
        );
    }
}

#[tokio::test]
async fn test_bare_version_still_installs_validator_and_version() {
    let sources = Sources::from_fixture(&json!({
        "collections/audit.yaml": {
            "name": "audit",
            "versions": [{"version": "1.0.0.1"}],
        },
        "dictionary/audit.1.0.0.yaml": {"type": "object", "properties": {}},
        "data/enumerators.json": [
            {"name": "Enumerations", "status": "active", "version": 1, "enumerators": {}},
        ],
    }));

    let db = MockDatabase::new();
    let processor = Processor::new(&db, Options::default());
    let reports = processor.run_all(&sources, &CancellationToken::new()).await;

    assert_eq!(reports[0].status, Status::Ok);
    assert_eq!(
        reports[0].operations,
        vec![
            Operation::DropValidator {
                version: "1.0.0.1".to_string()
            },
            Operation::AddValidator {
                version: "1.0.0.1".to_string()
            },
            Operation::WriteVersion {
                version: "1.0.0.1".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn test_failed_collection_does_not_stop_others() {
    let sources = Sources::from_fixture(&json!({
        "collections/users.yaml": {
            "name": "users",
            "versions": [{"version": "1.0.0.1"}],
        },
        "collections/orders.yaml": {
            "name": "orders",
            "versions": [{
                "version": "1.0.0.1",
                "add_indexes": [{"name": "orderIdx", "key": {"placed": 1}}],
            }],
        },
        "dictionary/users.1.0.0.yaml": {"type": "object", "properties": {}},
        "dictionary/orders.1.0.0.yaml": {"type": "object", "properties": {}},
        "data/enumerators.json": [
            {"name": "Enumerations", "status": "active", "version": 1, "enumerators": {}},
        ],
    }));

    let db = MockDatabase::new();
    db.fail_once("create_index/orders/orderIdx");

    let processor = Processor::new(&db, Options::default());
    let reports = processor.run_all(&sources, &CancellationToken::new()).await;

    // Reports are ordered by collection name.
    assert_eq!(reports[0].collection, "orders");
    assert_eq!(reports[0].status, Status::Failed);
    assert_eq!(reports[1].collection, "users");
    assert_eq!(reports[1].status, Status::Ok);

    assert_eq!(
        db.version_records(DEFAULT_VERSION_COLLECTION),
        vec![VersionRecord {
            collection_name: "users".to_string(),
            current_version: Version::new(1, 0, 0, 1),
        }]
    );
}

#[tokio::test]
async fn test_cancelled_run_commits_nothing() {
    let sources = users_fixture();
    let db = MockDatabase::new();
    let processor = Processor::new(&db, Options::default());

    let cancel = CancellationToken::new();
    cancel.cancel();

    let reports = processor.run_all(&sources, &cancel).await;
    assert_eq!(reports[0].status, Status::Failed);
    assert_eq!(reports[0].error.as_deref(), Some("processing was cancelled"));
    assert!(reports[0].operations.is_empty());
    assert!(db.version_records(DEFAULT_VERSION_COLLECTION).is_empty());
}

#[tokio::test]
async fn test_test_data_loads_when_enabled() {
    let sources = Sources::from_fixture(&json!({
        "collections/users.yaml": {
            "name": "users",
            "versions": [{"version": "1.0.0.1", "test_data": "users.1.0.0.1"}],
        },
        "dictionary/users.1.0.0.yaml": {"type": "object", "properties": {}},
        "data/enumerators.json": [
            {"name": "Enumerations", "status": "active", "version": 1, "enumerators": {}},
        ],
        "data/users.1.0.0.1.json": [
            {"userName": "alice"},
            {"userName": "bob"},
        ],
    }));

    let db = MockDatabase::new();
    let options = Options {
        load_test_data: true,
        ..Options::default()
    };
    let processor = Processor::new(&db, options);

    let reports = processor.run_all(&sources, &CancellationToken::new()).await;
    assert_eq!(reports[0].status, Status::Ok);
    assert!(reports[0].operations.contains(&Operation::LoadTestData {
        version: "1.0.0.1".to_string(),
        file: "users.1.0.0.1".to_string(),
        documents: 2,
    }));
    assert_eq!(db.collection("users").unwrap().documents.len(), 2);

    // Without the flag, the same fixture loads nothing.
    let db = MockDatabase::new();
    let processor = Processor::new(&db, Options::default());
    let reports = processor.run_all(&sources, &CancellationToken::new()).await;
    assert_eq!(reports[0].status, Status::Ok);
    assert!(db
        .collection("users")
        .map(|c| c.documents.is_empty())
        .unwrap_or(true));
}

#[tokio::test]
async fn test_current_versions_listing() {
    let sources = users_fixture();
    let db = MockDatabase::new();
    let processor = Processor::new(&db, Options::default());

    // Before processing, the collection reads as never applied.
    let records = processor.current_versions(&sources).await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].current_version.is_zero());

    processor.run_all(&sources, &CancellationToken::new()).await;

    let records = processor.current_versions(&sources).await.unwrap();
    assert_eq!(records[0].current_version, Version::new(1, 0, 0, 2));
}
