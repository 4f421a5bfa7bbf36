/// Error is the taxonomy of per-step processing failures. Any of these
/// aborts the current collection's transition; the previously persisted
/// version remains in force, and other collections keep running.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("index {name:?} already exists with a different definition")]
    IndexConflict { name: String },

    #[error("index {name:?} is invalid: {detail}")]
    IndexInvalid { name: String, detail: String },

    #[error("migration pipeline {pipeline} failed: {detail}")]
    MigrationFailed { pipeline: usize, detail: String },

    #[error("the database rejected the rendered validator: {detail}")]
    ValidatorRejected { detail: String },

    #[error("database unavailable: {detail}")]
    DatabaseUnavailable { detail: String },

    #[error("schema failed to render: {detail}")]
    RenderFailed { detail: String },

    #[error("bad version: {detail}")]
    BadVersion { detail: String },

    #[error("failed to encode document: {detail}")]
    Encode { detail: String },

    #[error("processing was cancelled")]
    Cancelled,

    #[error("deadline exceeded during {step}")]
    DeadlineExceeded { step: String },
}

impl Error {
    /// Whether a retry of the whole transition could succeed without
    /// operator intervention.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::DatabaseUnavailable { .. })
    }
}
