use std::path::PathBuf;

use thiserror::Error;

/// Failures talking to the object-storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bucket operation failed: {0}")]
    Bucket(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Failures talking to the warehouse backend.
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error("dataset operation failed: {0}")]
    Dataset(String),

    #[error("load job failed: {0}")]
    Load(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Top-level pipeline error. Extract/transform/load failures are fatal to a
/// run; the driver logs the failing stage and halts.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("non-numeric value {value:?} in column '{column}' at row {row}")]
    NonNumeric {
        column: String,
        row: usize,
        value: String,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error("initialization failed: {0}")]
    Init(String),
}
