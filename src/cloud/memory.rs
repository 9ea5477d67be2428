//! In-memory stand-ins for both cloud backends. They back the test suite
//! and implement just enough semantics to honor the contracts: buckets and
//! blobs live in maps, loads replace table contents wholesale, and the two
//! report aggregations are computed directly from the loaded rows.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::cloud::{BlobRef, ObjectStore, ReportRow, Warehouse};
use crate::error::{StorageError, WarehouseError};
use crate::table::Table;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
}

#[derive(Debug, Clone, Default)]
struct BucketState {
    location: String,
    objects: HashMap<String, StoredObject>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    buckets: Arc<RwLock<HashMap<String, BucketState>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn object_names(&self, bucket: &str) -> Vec<String> {
        let buckets = self.buckets.read().await;
        buckets
            .get(bucket)
            .map(|b| b.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn content_type(&self, bucket: &str, object: &str) -> Option<String> {
        let buckets = self.buckets.read().await;
        buckets
            .get(bucket)
            .and_then(|b| b.objects.get(object))
            .map(|o| o.content_type.clone())
    }

    pub async fn bucket_location(&self, bucket: &str) -> Option<String> {
        let buckets = self.buckets.read().await;
        buckets.get(bucket).map(|b| b.location.clone())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StorageError> {
        Ok(self.buckets.read().await.contains_key(bucket))
    }

    // Create-if-exists is idempotent, matching the backend's behavior under
    // the accepted same-day race.
    async fn create_bucket(&self, bucket: &str, location: &str) -> Result<(), StorageError> {
        let mut buckets = self.buckets.write().await;
        buckets.entry(bucket.to_string()).or_insert(BucketState {
            location: location.to_string(),
            objects: HashMap::new(),
        });
        Ok(())
    }

    async fn upload(
        &self,
        bucket: &str,
        object: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let mut buckets = self.buckets.write().await;
        let state = buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::Bucket(format!("no such bucket: {bucket}")))?;
        state.objects.insert(
            object.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn download(&self, bucket: &str, object: &str) -> Result<Vec<u8>, StorageError> {
        let buckets = self.buckets.read().await;
        buckets
            .get(bucket)
            .and_then(|b| b.objects.get(object))
            .map(|o| o.data.clone())
            .ok_or_else(|| StorageError::NotFound(format!("{bucket}/{object}")))
    }
}

#[derive(Debug, Default)]
struct WarehouseState {
    datasets: HashMap<String, String>,
    tables: HashMap<String, Table>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryWarehouse {
    state: Arc<RwLock<WarehouseState>>,
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn row_count(&self, dataset: &str, table: &str) -> Option<usize> {
        let state = self.state.read().await;
        state
            .tables
            .get(&format!("{dataset}.{table}"))
            .map(|t| t.num_rows())
    }

    pub async fn has_dataset(&self, dataset: &str) -> bool {
        self.state.read().await.datasets.contains_key(dataset)
    }
}

fn require_column(table: &Table, name: &str) -> Result<usize, WarehouseError> {
    table
        .column_index(name)
        .ok_or_else(|| WarehouseError::Query(format!("unknown column: {name}")))
}

/// Group `table` by `group_col`, summing `total_value`. The secondary
/// aggregate is the group's row count, or the mean of `sales_amount` when
/// `avg_sales` is set. Rows come back ordered by total sales descending.
fn aggregate(
    table: &Table,
    group_col: &str,
    avg_sales: bool,
    limit: Option<usize>,
) -> Result<Vec<ReportRow>, WarehouseError> {
    let group = require_column(table, group_col)?;
    let total_value = require_column(table, "total_value")?;
    let sales_amount = require_column(table, "sales_amount")?;

    let mut order: Vec<String> = Vec::new();
    let mut sums: HashMap<String, (f64, f64, usize)> = HashMap::new();
    for row in 0..table.num_rows() {
        let key = table.value(row, group).to_string();
        let tv = table.number(row, total_value).unwrap_or(0.0);
        let sa = table.number(row, sales_amount).unwrap_or(0.0);
        let entry = sums.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            (0.0, 0.0, 0)
        });
        entry.0 += tv;
        entry.1 += sa;
        entry.2 += 1;
    }

    let mut rows: Vec<ReportRow> = order
        .into_iter()
        .map(|label| {
            let (total, sales, count) = sums[&label];
            let metric = if avg_sales {
                sales / count as f64
            } else {
                count as f64
            };
            ReportRow {
                label,
                total_sales: total,
                metric,
            }
        })
        .collect();
    rows.sort_by(|a, b| b.total_sales.total_cmp(&a.total_sales));
    if let Some(limit) = limit {
        rows.truncate(limit);
    }
    Ok(rows)
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn ensure_dataset(&self, dataset: &str, location: &str) -> Result<(), WarehouseError> {
        let mut state = self.state.write().await;
        state
            .datasets
            .entry(dataset.to_string())
            .or_insert_with(|| location.to_string());
        Ok(())
    }

    async fn load_table(
        &self,
        dataset: &str,
        table: &str,
        data: &Table,
        _source: &BlobRef,
    ) -> Result<(), WarehouseError> {
        let mut state = self.state.write().await;
        if !state.datasets.contains_key(dataset) {
            return Err(WarehouseError::Dataset(format!(
                "no such dataset: {dataset}"
            )));
        }
        // Truncate-and-load: prior contents are discarded wholesale.
        state
            .tables
            .insert(format!("{dataset}.{table}"), data.clone());
        Ok(())
    }

    async fn query(&self, sql: &str) -> Result<Vec<ReportRow>, WarehouseError> {
        let state = self.state.read().await;
        let table = state
            .tables
            .iter()
            .find(|(name, _)| sql.contains(name.as_str()))
            .map(|(_, t)| t)
            .ok_or_else(|| WarehouseError::Query("no loaded table matches query".to_string()))?;

        if sql.contains("GROUP BY product") {
            aggregate(table, "product", false, Some(5))
        } else if sql.contains("GROUP BY customer_region") {
            aggregate(table, "customer_region", true, None)
        } else {
            Err(WarehouseError::Query("unsupported query shape".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> Table {
        Table::from_csv(
            "date,sales_amount,quantity,product,customer_region,month,total_value\n\
             2024-01-15,100,2,X,East,2024-01,200\n\
             2024-01-16,50,1,Y,West,2024-01,50\n\
             2024-01-17,25,4,X,East,2024-01,100\n"
                .as_bytes(),
        )
        .unwrap()
    }

    fn blob() -> BlobRef {
        BlobRef {
            bucket: "sales-etl-20240115".into(),
            object: "sales_data_20240115_000000.csv".into(),
        }
    }

    #[tokio::test]
    async fn upload_requires_bucket() {
        let store = MemoryObjectStore::new();
        assert!(store.upload("b", "o", vec![1], "text/csv").await.is_err());

        store.create_bucket("b", "US").await.unwrap();
        assert_eq!(store.bucket_location("b").await.as_deref(), Some("US"));
        store.upload("b", "o", vec![1], "text/csv").await.unwrap();
        assert_eq!(store.download("b", "o").await.unwrap(), vec![1]);
        assert_eq!(store.content_type("b", "o").await.unwrap(), "text/csv");
    }

    #[tokio::test]
    async fn load_replaces_prior_contents() {
        let wh = MemoryWarehouse::new();
        wh.ensure_dataset("sales_etl", "US").await.unwrap();

        let a = sample_table();
        wh.load_table("sales_etl", "sales_data", &a, &blob())
            .await
            .unwrap();
        assert_eq!(wh.row_count("sales_etl", "sales_data").await, Some(3));

        let b = Table::from_csv(
            "date,sales_amount,quantity,product,customer_region,month,total_value\n\
             2024-01-18,10,1,Z,North,2024-01,10\n"
                .as_bytes(),
        )
        .unwrap();
        wh.load_table("sales_etl", "sales_data", &b, &blob())
            .await
            .unwrap();
        assert_eq!(wh.row_count("sales_etl", "sales_data").await, Some(1));
    }

    #[tokio::test]
    async fn product_query_aggregates_and_sorts() {
        let wh = MemoryWarehouse::new();
        wh.ensure_dataset("sales_etl", "US").await.unwrap();
        wh.load_table("sales_etl", "sales_data", &sample_table(), &blob())
            .await
            .unwrap();

        let rows = wh
            .query("SELECT product FROM `p.sales_etl.sales_data` GROUP BY product")
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].label, "X");
        assert_eq!(rows[0].total_sales, 300.0);
        assert_eq!(rows[0].metric, 2.0);
        assert_eq!(rows[1].label, "Y");
    }

    #[tokio::test]
    async fn regional_query_averages_order_value() {
        let wh = MemoryWarehouse::new();
        wh.ensure_dataset("sales_etl", "US").await.unwrap();
        wh.load_table("sales_etl", "sales_data", &sample_table(), &blob())
            .await
            .unwrap();

        let rows = wh
            .query("SELECT customer_region FROM `p.sales_etl.sales_data` GROUP BY customer_region")
            .await
            .unwrap();
        assert_eq!(rows[0].label, "East");
        assert_eq!(rows[0].total_sales, 300.0);
        assert_eq!(rows[0].metric, 62.5);
    }
}
