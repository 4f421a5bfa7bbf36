//! MockDatabase is an in-memory [`Database`] for tests: it keeps
//! collections, validators, indexes and version records in maps, records
//! every operation in an ordered log, and supports scripted one-shot
//! failures and scripted aggregation outcomes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;

use models::{IndexSpec, VersionRecord};

use crate::database::{index_key_document, IndexInfo};
use crate::{Database, Error};

#[derive(Default)]
pub struct MockDatabase {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    collections: BTreeMap<String, MockCollection>,
    // Version records per store collection, in insertion order.
    version_records: BTreeMap<String, Vec<VersionRecord>>,
    // Ordered log of every operation performed.
    log: Vec<String>,
    // Operation keys which fail once with DatabaseUnavailable, then clear.
    fail_once: BTreeSet<String>,
    // Scripted post-aggregation contents, keyed by collection.
    aggregate_results: BTreeMap<String, Vec<Value>>,
}

#[derive(Default, Clone)]
pub struct MockCollection {
    pub validator: Option<Value>,
    pub indexes: BTreeMap<String, IndexInfo>,
    pub documents: Vec<Value>,
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the operation key `key` (as logged, e.g.
    /// `create_index/users/nameIdx`) to fail once with DatabaseUnavailable.
    pub fn fail_once(&self, key: &str) {
        self.state.lock().unwrap().fail_once.insert(key.to_string());
    }

    /// Script `collection`'s documents after its next aggregation.
    pub fn script_aggregate_result(&self, collection: &str, documents: Vec<Value>) {
        self.state
            .lock()
            .unwrap()
            .aggregate_results
            .insert(collection.to_string(), documents);
    }

    pub fn insert_documents(&self, collection: &str, documents: Vec<Value>) {
        let mut state = self.state.lock().unwrap();
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .documents
            .extend(documents);
    }

    pub fn collection(&self, name: &str) -> Option<MockCollection> {
        self.state.lock().unwrap().collections.get(name).cloned()
    }

    pub fn version_records(&self, store: &str) -> Vec<VersionRecord> {
        self.state
            .lock()
            .unwrap()
            .version_records
            .get(store)
            .cloned()
            .unwrap_or_default()
    }

    /// Seed the version store directly, bypassing the upsert.
    pub fn seed_version_records(&self, store: &str, records: Vec<VersionRecord>) {
        self.state
            .lock()
            .unwrap()
            .version_records
            .insert(store.to_string(), records);
    }

    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn clear_log(&self) {
        self.state.lock().unwrap().log.clear();
    }

    fn begin(&self, key: String) -> Result<std::sync::MutexGuard<'_, State>, Error> {
        let mut state = self.state.lock().unwrap();
        state.log.push(key.clone());
        if state.fail_once.remove(&key) {
            return Err(Error::DatabaseUnavailable {
                detail: format!("scripted failure of {key}"),
            });
        }
        Ok(state)
    }
}

impl Database for MockDatabase {
    fn list_collections(&self) -> BoxFuture<'_, Result<Vec<String>, Error>> {
        async move {
            let state = self.begin("list_collections".to_string())?;
            Ok(state.collections.keys().cloned().collect())
        }
        .boxed()
    }

    fn get_validator<'a>(
        &'a self,
        collection: &'a str,
    ) -> BoxFuture<'a, Result<Option<Value>, Error>> {
        async move {
            let state = self.begin(format!("get_validator/{collection}"))?;
            Ok(state
                .collections
                .get(collection)
                .and_then(|c| c.validator.clone()))
        }
        .boxed()
    }

    fn set_validator<'a>(
        &'a self,
        collection: &'a str,
        schema: &'a Value,
        level: &'a str,
        action: &'a str,
    ) -> BoxFuture<'a, Result<(), Error>> {
        async move {
            let mut state = self.begin(format!("set_validator/{collection}/{level}/{action}"))?;
            state
                .collections
                .entry(collection.to_string())
                .or_default()
                .validator = Some(schema.clone());
            Ok(())
        }
        .boxed()
    }

    fn clear_validator<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<(), Error>> {
        async move {
            let mut state = self.begin(format!("clear_validator/{collection}"))?;
            if let Some(entry) = state.collections.get_mut(collection) {
                entry.validator = None;
            }
            Ok(())
        }
        .boxed()
    }

    fn list_indexes<'a>(
        &'a self,
        collection: &'a str,
    ) -> BoxFuture<'a, Result<Vec<IndexInfo>, Error>> {
        async move {
            let state = self.begin(format!("list_indexes/{collection}"))?;
            Ok(state
                .collections
                .get(collection)
                .map(|c| c.indexes.values().cloned().collect())
                .unwrap_or_default())
        }
        .boxed()
    }

    fn create_index<'a>(
        &'a self,
        collection: &'a str,
        index: &'a IndexSpec,
    ) -> BoxFuture<'a, Result<(), Error>> {
        async move {
            let mut state = self.begin(format!("create_index/{collection}/{}", index.name))?;
            let entry = state.collections.entry(collection.to_string()).or_default();

            let info = IndexInfo {
                name: index.name.clone(),
                key: index_key_document(index),
                options: index.options.clone(),
            };
            match entry.indexes.get(&index.name) {
                Some(existing) if existing.key != info.key => Err(Error::IndexConflict {
                    name: index.name.clone(),
                }),
                _ => {
                    entry.indexes.insert(index.name.clone(), info);
                    Ok(())
                }
            }
        }
        .boxed()
    }

    fn drop_index<'a>(
        &'a self,
        collection: &'a str,
        index_name: &'a str,
    ) -> BoxFuture<'a, Result<bool, Error>> {
        async move {
            let mut state = self.begin(format!("drop_index/{collection}/{index_name}"))?;
            Ok(state
                .collections
                .get_mut(collection)
                .is_some_and(|c| c.indexes.remove(index_name).is_some()))
        }
        .boxed()
    }

    fn aggregate<'a>(
        &'a self,
        collection: &'a str,
        pipeline: &'a [Value],
    ) -> BoxFuture<'a, Result<(), Error>> {
        async move {
            let mut state = self.begin(format!("aggregate/{collection}/{}", pipeline.len()))?;
            if let Some(documents) = state.aggregate_results.remove(collection) {
                state
                    .collections
                    .entry(collection.to_string())
                    .or_default()
                    .documents = documents;
            }
            Ok(())
        }
        .boxed()
    }

    fn find_version_records<'a>(
        &'a self,
        store: &'a str,
        collection: &'a str,
    ) -> BoxFuture<'a, Result<Vec<VersionRecord>, Error>> {
        async move {
            let state = self.begin(format!("find_version_records/{store}/{collection}"))?;
            Ok(state
                .version_records
                .get(store)
                .map(|records| {
                    records
                        .iter()
                        .filter(|record| record.collection_name == collection)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default())
        }
        .boxed()
    }

    fn upsert_version_record<'a>(
        &'a self,
        store: &'a str,
        record: &'a VersionRecord,
    ) -> BoxFuture<'a, Result<(), Error>> {
        async move {
            let mut state = self.begin(format!(
                "upsert_version_record/{store}/{}/{}",
                record.collection_name, record.current_version
            ))?;
            let records = state.version_records.entry(store.to_string()).or_default();
            match records
                .iter_mut()
                .find(|existing| existing.collection_name == record.collection_name)
            {
                Some(existing) => existing.current_version = record.current_version,
                None => records.push(record.clone()),
            }
            Ok(())
        }
        .boxed()
    }

    fn insert_many<'a>(
        &'a self,
        collection: &'a str,
        documents: &'a [Value],
    ) -> BoxFuture<'a, Result<(), Error>> {
        async move {
            let mut state = self.begin(format!("insert_many/{collection}/{}", documents.len()))?;
            state
                .collections
                .entry(collection.to_string())
                .or_default()
                .documents
                .extend(documents.iter().cloned());
            Ok(())
        }
        .boxed()
    }
}
