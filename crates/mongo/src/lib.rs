//! The `mongodb`-driver implementation of the engine's database capability.
//! JSON ↔ BSON conversion is confined to this crate: the engine hands over
//! `serde_json::Value` schemas, pipelines and documents, and this crate
//! owns their wire form and the mapping of server error codes onto the
//! engine's error taxonomy.

use anyhow::Context;
use bson::{doc, Bson, Document};
use futures::future::BoxFuture;
use futures::{FutureExt, TryStreamExt};
use mongodb::options::{AggregateOptions, ReadConcern, WriteConcern};
use mongodb::Client;
use serde_json::Value;

use models::{IndexSpec, VersionRecord};
use runtime::{Database, Error, IndexInfo};

// Server error codes this crate gives meaning to.
const NAMESPACE_NOT_FOUND: i32 = 26;
const INDEX_NOT_FOUND: i32 = 27;
const CANNOT_CREATE_INDEX: i32 = 67;
const INDEX_OPTIONS_CONFLICT: i32 = 85;
const INDEX_KEY_SPECS_CONFLICT: i32 = 86;

/// MongoDb wraps one database handle of a connected client.
pub struct MongoDb {
    db: mongodb::Database,
}

impl MongoDb {
    /// Connect to `uri` and open `database`. The URI carries all transport
    /// parameters (TLS, credentials, replica set); it is injected and never
    /// parsed here.
    pub async fn connect(uri: &str, database: &str) -> anyhow::Result<MongoDb> {
        let client = Client::with_uri_str(uri)
            .await
            .context("failed to connect to the database")?;
        let db = client.database(database);

        tracing::debug!(database, "connected");
        Ok(MongoDb { db })
    }

    pub fn new(db: mongodb::Database) -> MongoDb {
        MongoDb { db }
    }
}

/// Map a driver error onto the engine taxonomy: anything without a more
/// specific meaning at its call site is a transport-level availability
/// problem.
fn unavailable(err: mongodb::error::Error) -> Error {
    Error::DatabaseUnavailable {
        detail: err.to_string(),
    }
}

/// The server error code of a command failure, if that's what `err` is.
fn command_code(err: &mongodb::error::Error) -> Option<i32> {
    match err.kind.as_ref() {
        mongodb::error::ErrorKind::Command(command) => Some(command.code),
        _ => None,
    }
}

fn to_document(value: &Value) -> Result<Document, Error> {
    let bson = bson::to_bson(value).map_err(|err| Error::Encode {
        detail: err.to_string(),
    })?;
    match bson {
        Bson::Document(document) => Ok(document),
        _ => Err(Error::Encode {
            detail: "expected a JSON object".to_string(),
        }),
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

impl Database for MongoDb {
    fn list_collections(&self) -> BoxFuture<'_, Result<Vec<String>, Error>> {
        async move {
            self.db
                .list_collection_names()
                .await
                .map_err(unavailable)
        }
        .boxed()
    }

    fn get_validator<'a>(
        &'a self,
        collection: &'a str,
    ) -> BoxFuture<'a, Result<Option<Value>, Error>> {
        async move {
            let mut cursor = self
                .db
                .list_collections()
                .filter(doc! {"name": collection})
                .await
                .map_err(unavailable)?;

            let Some(spec) = cursor.try_next().await.map_err(unavailable)? else {
                return Ok(None);
            };
            Ok(spec.options.validator.as_ref().map(to_value))
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
            let schema = to_document(schema)?;
            let command = doc! {
                "collMod": collection,
                "validator": {"$jsonSchema": schema.clone()},
                "validationLevel": level,
                "validationAction": action,
            };

            match self.db.run_command(command).await {
                Ok(_) => Ok(()),
                // collMod requires an existing collection; create it with
                // the validator attached instead.
                Err(err) if command_code(&err) == Some(NAMESPACE_NOT_FOUND) => {
                    let create = doc! {
                        "create": collection,
                        "validator": {"$jsonSchema": schema},
                        "validationLevel": level,
                        "validationAction": action,
                    };
                    self.db.run_command(create).await.map_err(|err| {
                        match command_code(&err) {
                            Some(_) => Error::ValidatorRejected {
                                detail: err.to_string(),
                            },
                            None => unavailable(err),
                        }
                    })?;
                    Ok(())
                }
                Err(err) => match command_code(&err) {
                    Some(_) => Err(Error::ValidatorRejected {
                        detail: err.to_string(),
                    }),
                    None => Err(unavailable(err)),
                },
            }
        }
        .boxed()
    }

    fn clear_validator<'a>(&'a self, collection: &'a str) -> BoxFuture<'a, Result<(), Error>> {
        async move {
            let command = doc! {
                "collMod": collection,
                "validator": {},
                "validationLevel": "off",
            };
            match self.db.run_command(command).await {
                Ok(_) => Ok(()),
                // A collection that doesn't exist has no validator to clear.
                Err(err) if command_code(&err) == Some(NAMESPACE_NOT_FOUND) => Ok(()),
                Err(err) => Err(unavailable(err)),
            }
        }
        .boxed()
    }

    fn list_indexes<'a>(
        &'a self,
        collection: &'a str,
    ) -> BoxFuture<'a, Result<Vec<IndexInfo>, Error>> {
        async move {
            let handle = self.db.collection::<Document>(collection);
            let cursor = match handle.list_indexes().await {
                Ok(cursor) => cursor,
                // An absent collection simply has no indexes yet.
                Err(err) if command_code(&err) == Some(NAMESPACE_NOT_FOUND) => {
                    return Ok(Vec::new())
                }
                Err(err) => return Err(unavailable(err)),
            };

            let models: Vec<mongodb::IndexModel> =
                cursor.try_collect().await.map_err(unavailable)?;

            Ok(models
                .into_iter()
                .map(|model| IndexInfo {
                    name: model
                        .options
                        .as_ref()
                        .and_then(|options| options.name.clone())
                        .unwrap_or_default(),
                    key: to_value(&model.keys),
                    options: model
                        .options
                        .as_ref()
                        .map(to_value)
                        .unwrap_or(Value::Null),
                })
                .collect())
        }
        .boxed()
    }

    fn create_index<'a>(
        &'a self,
        collection: &'a str,
        index: &'a IndexSpec,
    ) -> BoxFuture<'a, Result<(), Error>> {
        async move {
            let key = to_document(&runtime::index_key_document(index))?;

            let mut index_doc = doc! {"key": key, "name": &index.name};
            if let Some(options) = index.options.as_object() {
                for (option, value) in options {
                    let value = bson::to_bson(value).map_err(|err| Error::Encode {
                        detail: err.to_string(),
                    })?;
                    index_doc.insert(option, value);
                }
            }

            let command = doc! {"createIndexes": collection, "indexes": [index_doc]};
            self.db
                .run_command(command)
                .await
                .map_err(|err| match command_code(&err) {
                    Some(INDEX_OPTIONS_CONFLICT) | Some(INDEX_KEY_SPECS_CONFLICT) => {
                        Error::IndexConflict {
                            name: index.name.clone(),
                        }
                    }
                    Some(CANNOT_CREATE_INDEX) => Error::IndexInvalid {
                        name: index.name.clone(),
                        detail: err.to_string(),
                    },
                    _ => unavailable(err),
                })?;
            Ok(())
        }
        .boxed()
    }

    fn drop_index<'a>(
        &'a self,
        collection: &'a str,
        index_name: &'a str,
    ) -> BoxFuture<'a, Result<bool, Error>> {
        async move {
            let command = doc! {"dropIndexes": collection, "index": index_name};
            match self.db.run_command(command).await {
                Ok(_) => Ok(true),
                Err(err)
                    if matches!(
                        command_code(&err),
                        Some(INDEX_NOT_FOUND) | Some(NAMESPACE_NOT_FOUND)
                    ) =>
                {
                    Ok(false)
                }
                Err(err) => Err(unavailable(err)),
            }
        }
        .boxed()
    }

    fn aggregate<'a>(
        &'a self,
        collection: &'a str,
        pipeline: &'a [Value],
    ) -> BoxFuture<'a, Result<(), Error>> {
        async move {
            let stages: Vec<Document> = pipeline
                .iter()
                .map(to_document)
                .collect::<Result<_, _>>()?;

            let options = AggregateOptions::builder()
                .allow_disk_use(true)
                .read_concern(ReadConcern::majority())
                .write_concern(WriteConcern::majority())
                .build();

            let mut cursor = self
                .db
                .collection::<Document>(collection)
                .aggregate(stages)
                .with_options(options)
                .await
                .map_err(unavailable)?;

            // Terminal $merge/$out stages return nothing; drain whatever a
            // merge-less pipeline yields so the command runs to completion.
            let mut discarded = 0usize;
            while cursor.try_next().await.map_err(unavailable)?.is_some() {
                discarded += 1;
            }
            if discarded > 0 {
                tracing::info!(collection, discarded, "pipeline returned documents; discarded");
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
            let handle = self.db.collection::<VersionRecord>(store);
            let cursor = handle
                .find(doc! {"collection_name": collection})
                .await
                .map_err(unavailable)?;
            cursor.try_collect().await.map_err(unavailable)
        }
        .boxed()
    }

    fn upsert_version_record<'a>(
        &'a self,
        store: &'a str,
        record: &'a VersionRecord,
    ) -> BoxFuture<'a, Result<(), Error>> {
        async move {
            let handle = self.db.collection::<Document>(store);
            handle
                .update_one(
                    doc! {"collection_name": &record.collection_name},
                    doc! {"$set": {"current_version": record.current_version.to_string()}},
                )
                .upsert(true)
                .await
                .map_err(unavailable)?;
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
            if documents.is_empty() {
                return Ok(());
            }
            let documents: Vec<Document> = documents
                .iter()
                .map(to_document)
                .collect::<Result<_, _>>()?;

            self.db
                .collection::<Document>(collection)
                .insert_many(documents)
                .await
                .map_err(unavailable)?;
            Ok(())
        }
        .boxed()
    }
}
