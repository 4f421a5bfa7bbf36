//! Execution engine: the database capability seam, the version store, the
//! index / migration / schema managers, and the processor state machine
//! which drives the six-step version transition per collection.

mod apply;
mod database;
mod error;
mod indexes;
mod migrate;
pub mod mock;
mod processor;
mod store;

pub use apply::{SchemaApplier, VALIDATION_ACTION, VALIDATION_LEVEL};
pub use database::{index_key_document, Database, IndexInfo};
pub use error::Error;
pub use indexes::IndexManager;
pub use migrate::MigrationManager;
pub use processor::{
    CollectionReport, Operation, Options, Processor, Status, OP_TIMEOUT, PIPELINE_TIMEOUT,
    TRANSITION_TIMEOUT, WORKER_CAP,
};
pub use store::{VersionStore, DEFAULT_VERSION_COLLECTION};
