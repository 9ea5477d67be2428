//! Narrow contracts over the two cloud collaborators. The pipeline only
//! talks to these traits, so tests run against the in-memory backends in
//! [`memory`] while production wires up [`gcs`] and [`bigquery`].

use async_trait::async_trait;

use crate::error::{StorageError, WarehouseError};
use crate::table::Table;

pub mod bigquery;
pub mod gcs;
pub mod memory;

/// A blob written by the storage stage, handed to the warehouse stage as the
/// bulk-load source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobRef {
    pub bucket: String,
    pub object: String,
}

impl BlobRef {
    pub fn uri(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.object)
    }
}

/// One result row from a report query: a grouping label plus its two
/// aggregates (the second aggregate is an order count for the product
/// report and an average order value for the regional report).
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub label: String,
    pub total_sales: f64,
    pub metric: f64,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StorageError>;

    async fn create_bucket(&self, bucket: &str, location: &str) -> Result<(), StorageError>;

    async fn upload(
        &self,
        bucket: &str,
        object: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    async fn download(&self, bucket: &str, object: &str) -> Result<Vec<u8>, StorageError>;
}

#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Fetch the dataset, creating it in `location` when absent.
    async fn ensure_dataset(&self, dataset: &str, location: &str) -> Result<(), WarehouseError>;

    /// Replace the table's contents with `data`, inferring the schema from
    /// the data itself. `source` is the staged CSV blob backing the load.
    /// Blocks until the load completes.
    async fn load_table(
        &self,
        dataset: &str,
        table: &str,
        data: &Table,
        source: &BlobRef,
    ) -> Result<(), WarehouseError>;

    /// Run one aggregate query and collect its rows. Every report query
    /// yields rows shaped as (label, total_sales, secondary aggregate).
    async fn query(&self, sql: &str) -> Result<Vec<ReportRow>, WarehouseError>;
}
