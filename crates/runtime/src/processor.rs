use std::time::Duration;

use futures::StreamExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use dictionary::{Context, EnumeratorRegistry, Resolved};
use models::{CollectionConfig, Errors, Version, VersionRecord, VersionSpec};
use sources::Sources;

use crate::apply::SchemaApplier;
use crate::indexes::IndexManager;
use crate::migrate::MigrationManager;
use crate::store::VersionStore;
use crate::{Database, Error};

pub const OP_TIMEOUT: Duration = Duration::from_secs(30);
pub const PIPELINE_TIMEOUT: Duration = Duration::from_secs(600); // Ten minutes.
pub const TRANSITION_TIMEOUT: Duration = Duration::from_secs(3600); // One hour.

/// Upper bound on concurrently-processed collections when no explicit
/// worker count is configured.
pub const WORKER_CAP: usize = 4;

/// Options of one processing run.
#[derive(Clone, Debug)]
pub struct Options {
    /// Name of the dedicated collection holding version records.
    pub version_collection: String,
    /// Whether to load declared test data after a successful transition.
    pub load_test_data: bool,
    /// Concurrent collection workers. Zero means one per collection,
    /// capped at [`WORKER_CAP`].
    pub workers: usize,
    pub op_timeout: Duration,
    pub pipeline_timeout: Duration,
    pub transition_timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            version_collection: crate::store::DEFAULT_VERSION_COLLECTION.to_string(),
            load_test_data: false,
            workers: 0,
            op_timeout: OP_TIMEOUT,
            pipeline_timeout: PIPELINE_TIMEOUT,
            transition_timeout: TRANSITION_TIMEOUT,
        }
    }
}

#[derive(Serialize, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Failed,
}

/// One executed step of a transition, in execution order.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case", tag = "operation")]
pub enum Operation {
    DropValidator { version: String },
    DropIndex { version: String, index: String, existed: bool },
    Migration { version: String, pipeline: usize },
    MigrationNoOp { version: String, pipeline: usize },
    AddIndex { version: String, index: String, created: bool },
    AddValidator { version: String },
    WriteVersion { version: String },
    LoadTestData { version: String, file: String, documents: usize },
}

/// Outcome of processing one collection.
#[derive(Serialize, Clone, Debug)]
pub struct CollectionReport {
    pub collection: String,
    pub operations: Vec<Operation>,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A step failure: the step's name paired with its error.
type StepError = (&'static str, Error);

/// Processor advances each configured collection from its persisted
/// current version to every subsequent declared version, one six-step
/// transition per version. Collections are processed concurrently; all
/// work within one collection is strictly sequential.
pub struct Processor<'a> {
    db: &'a dyn Database,
    options: Options,
}

impl<'a> Processor<'a> {
    pub fn new(db: &'a dyn Database, options: Options) -> Self {
        Processor { db, options }
    }

    /// Process every configured collection. The returned reports are
    /// ordered by collection name; execution order across collections is
    /// unspecified.
    pub async fn run_all(
        &self,
        sources: &Sources,
        cancel: &CancellationToken,
    ) -> Vec<CollectionReport> {
        let workers = match self.options.workers {
            0 => sources.collections.len().clamp(1, WORKER_CAP),
            explicit => explicit,
        };

        let mut reports: Vec<CollectionReport> = futures::stream::iter(sources.collections.values())
            .map(|config| self.process_collection(sources, config, cancel))
            .buffer_unordered(workers)
            .collect()
            .await;

        reports.sort_by(|a, b| a.collection.cmp(&b.collection));
        reports
    }

    /// Process a single collection by name, or None if it isn't configured.
    pub async fn run_one(
        &self,
        sources: &Sources,
        name: &str,
        cancel: &CancellationToken,
    ) -> Option<CollectionReport> {
        let config = sources.collections.get(name)?;
        Some(self.process_collection(sources, config, cancel).await)
    }

    /// Current version of every configured collection, as recorded by the
    /// version store.
    pub async fn current_versions(&self, sources: &Sources) -> Result<Vec<VersionRecord>, Error> {
        let store = VersionStore::new(self.db, &self.options.version_collection);

        let mut records = Vec::new();
        for name in sources.collections.keys() {
            let current_version = store.read(name).await?;
            records.push(VersionRecord {
                collection_name: name.clone(),
                current_version,
            });
        }
        Ok(records)
    }

    async fn process_collection(
        &self,
        sources: &Sources,
        config: &CollectionConfig,
        cancel: &CancellationToken,
    ) -> CollectionReport {
        let collection = config.name.to_string();
        let mut operations = Vec::new();

        match self
            .advance(sources, config, &mut operations, cancel)
            .await
        {
            Ok(()) => {
                tracing::info!(%collection, operations = operations.len(), "collection is current");
                CollectionReport {
                    collection,
                    operations,
                    status: Status::Ok,
                    failed_version: None,
                    failed_step: None,
                    error: None,
                }
            }
            Err((version, step, err)) => {
                tracing::error!(
                    %collection,
                    version = %version,
                    step,
                    error = %err,
                    retriable = err.is_retriable(),
                    "transition failed; prior version remains in force",
                );
                CollectionReport {
                    collection,
                    operations,
                    status: Status::Failed,
                    failed_version: (!version.is_empty()).then_some(version),
                    failed_step: Some(step.to_string()),
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// Run every pending transition of `config`, in ascending version
    /// order. The first failing step aborts with its version and name.
    async fn advance(
        &self,
        sources: &Sources,
        config: &CollectionConfig,
        operations: &mut Vec<Operation>,
        cancel: &CancellationToken,
    ) -> Result<(), (String, &'static str, Error)> {
        let collection = config.name.as_str();
        let store = VersionStore::new(self.db, &self.options.version_collection);

        let current = self
            .step("read_version", store.read(collection))
            .await
            .map_err(|(step, err)| (String::new(), step, err))?;
        tracing::debug!(collection, current = %current, "read current version");

        for spec in &config.versions {
            let version = spec
                .parsed_version()
                .map_err(|err| {
                    (
                        spec.version.clone(),
                        "parse_version",
                        Error::BadVersion {
                            detail: err.to_string(),
                        },
                    )
                })?;
            if version <= current {
                continue;
            }

            // Cancellation is honored between versions and between steps,
            // never mid-step.
            if cancel.is_cancelled() {
                return Err((version.to_string(), "cancel", Error::Cancelled));
            }

            let transition = self.transition(sources, collection, spec, version, operations, cancel);
            match tokio::time::timeout(self.options.transition_timeout, transition).await {
                Ok(Ok(())) => (),
                Ok(Err((step, err))) => return Err((version.to_string(), step, err)),
                Err(_) => {
                    return Err((
                        version.to_string(),
                        "transition",
                        Error::DeadlineExceeded {
                            step: "transition".to_string(),
                        },
                    ));
                }
            }
        }
        Ok(())
    }

    /// One six-step version transition. Steps are strictly sequential and
    /// the version record is written only after every prior step succeeds.
    async fn transition(
        &self,
        sources: &Sources,
        collection: &str,
        spec: &VersionSpec,
        version: Version,
        operations: &mut Vec<Operation>,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        let version_str = version.to_string();
        tracing::info!(collection, version = %version_str, "starting transition");

        let resolved = self
            .render(sources, collection, version)
            .map_err(|err| ("render_schema", err))?;
        let bson_schema = dictionary::render_bson_schema(&resolved);

        let applier = SchemaApplier::new(self.db);
        let indexes = IndexManager::new(self.db);
        let migrations = MigrationManager::new(self.db);
        let store = VersionStore::new(self.db, &self.options.version_collection);

        // (a) Drop any existing validator.
        self.ensure_live("drop_validator", cancel)?;
        self.step("drop_validator", applier.clear(collection)).await?;
        operations.push(Operation::DropValidator {
            version: version_str.clone(),
        });

        // (b) Drop declared indexes. Missing names are skipped silently.
        self.ensure_live("drop_indexes", cancel)?;
        for name in &spec.drop_indexes {
            let existed = self
                .step("drop_indexes", indexes.drop(collection, name))
                .await?;
            operations.push(Operation::DropIndex {
                version: version_str.clone(),
                index: name.clone(),
                existed,
            });
        }

        // (c) Run migration pipelines in declared order.
        self.ensure_live("migrate", cancel)?;
        for (position, pipeline) in spec.aggregations.iter().enumerate() {
            let terminal = MigrationManager::is_terminal_write(pipeline);
            if !terminal {
                tracing::info!(
                    collection,
                    pipeline = position,
                    "pipeline has no terminal write stage; results will be discarded",
                );
            }

            match tokio::time::timeout(
                self.options.pipeline_timeout,
                migrations.run(collection, position, pipeline),
            )
            .await
            {
                Ok(Ok(())) => (),
                Ok(Err(err)) => return Err(("migrate", err)),
                Err(_) => {
                    return Err((
                        "migrate",
                        Error::DeadlineExceeded {
                            step: format!("migrate pipeline {position}"),
                        },
                    ));
                }
            }

            operations.push(if terminal {
                Operation::Migration {
                    version: version_str.clone(),
                    pipeline: position,
                }
            } else {
                Operation::MigrationNoOp {
                    version: version_str.clone(),
                    pipeline: position,
                }
            });
        }

        // (d) Add declared indexes.
        self.ensure_live("add_indexes", cancel)?;
        for index in &spec.add_indexes {
            let created = self
                .step("add_indexes", indexes.create(collection, index))
                .await?;
            operations.push(Operation::AddIndex {
                version: version_str.clone(),
                index: index.name.clone(),
                created,
            });
        }

        // (e) Install the rendered validator.
        self.ensure_live("add_validator", cancel)?;
        self.step("add_validator", applier.apply(collection, &bson_schema))
            .await?;
        operations.push(Operation::AddValidator {
            version: version_str.clone(),
        });

        // (f) Persist the version record.
        self.ensure_live("write_version", cancel)?;
        self.step("write_version", store.write(collection, version))
            .await?;
        operations.push(Operation::WriteVersion {
            version: version_str.clone(),
        });

        // (g) Optionally load test data.
        if self.options.load_test_data {
            if let Some(file) = &spec.test_data {
                self.ensure_live("load_test_data", cancel)?;
                let documents = sources.test_data.get(file).cloned().unwrap_or_default();
                self.step(
                    "load_test_data",
                    self.db.insert_many(collection, &documents),
                )
                .await?;
                operations.push(Operation::LoadTestData {
                    version: version_str.clone(),
                    file: file.clone(),
                    documents: documents.len(),
                });
            }
        }

        tracing::info!(collection, version = %version_str, "transition committed");
        Ok(())
    }

    /// Render the BSON/JSON schema pair of `(collection, version)`. The
    /// validation pass has already proven this renders cleanly; a failure
    /// here means processing was invoked against different sources.
    fn render(
        &self,
        sources: &Sources,
        collection: &str,
        version: Version,
    ) -> Result<Resolved, Error> {
        let mut errors = Errors::new();
        let registry = EnumeratorRegistry::new(&sources.enumerators, &mut errors);
        let ctx = Context {
            registry: &registry,
            types: &sources.types,
            schemas: &sources.schemas,
            enumerator_version: Some(version.enumerators),
        };

        let stem = format!("{collection}.{}", version.schema_suffix());
        let resolved = ctx.resolve_file(&stem, &mut errors);

        match resolved {
            Some(resolved) if errors.is_empty() => Ok(resolved),
            Some(_) => Err(Error::RenderFailed {
                detail: errors
                    .iter()
                    .map(|error| error.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            }),
            None => Err(Error::RenderFailed {
                detail: format!("schema file dictionary/{stem}.yaml was not found"),
            }),
        }
    }

    fn ensure_live(&self, step: &'static str, cancel: &CancellationToken) -> Result<(), StepError> {
        if cancel.is_cancelled() {
            Err((step, Error::Cancelled))
        } else {
            Ok(())
        }
    }

    /// Run one database step under the per-operation timeout.
    async fn step<T>(
        &self,
        name: &'static str,
        fut: impl std::future::Future<Output = Result<T, Error>>,
    ) -> Result<T, StepError> {
        match tokio::time::timeout(self.options.op_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err((name, err)),
            Err(_) => Err((
                name,
                Error::DeadlineExceeded {
                    step: name.to_string(),
                },
            )),
        }
    }
}
