use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tempfile::NamedTempFile;

use sales_etl::cloud::memory::{MemoryObjectStore, MemoryWarehouse};
use sales_etl::cloud::{BlobRef, ObjectStore, ReportRow, Warehouse};
use sales_etl::config::PipelineConfig;
use sales_etl::error::{PipelineError, WarehouseError};
use sales_etl::pipeline::Pipeline;
use sales_etl::table::Table;

fn config() -> PipelineConfig {
    PipelineConfig {
        project_id: "demo-project".into(),
        bucket_prefix: "sales-etl".into(),
        dataset_id: "sales_etl".into(),
        table_id: "sales_data".into(),
        location: "US".into(),
    }
}

fn write_source(content: &str) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    write!(file, "{content}")?;
    Ok(file)
}

const SINGLE_ROW: &str = "date,sales_amount,quantity,product,customer_region\n\
                          2024-01-15,100,2,X,East\n";

#[tokio::test]
async fn full_run_stages_blob_and_loads_warehouse() -> Result<()> {
    let source = write_source(SINGLE_ROW)?;
    let store = MemoryObjectStore::new();
    let warehouse = MemoryWarehouse::new();
    let pipeline = Pipeline::new(
        config(),
        Arc::new(store.clone()),
        Arc::new(warehouse.clone()),
    );

    pipeline.run(source.path()).await?;

    // The day's bucket holds exactly one timestamped CSV blob.
    let bucket = config().bucket_name(Utc::now().date_naive());
    let objects = store.object_names(&bucket).await;
    assert_eq!(objects.len(), 1);
    assert!(objects[0].starts_with("sales_data_"));
    assert!(objects[0].ends_with(".csv"));
    assert_eq!(
        store.content_type(&bucket, &objects[0]).await.as_deref(),
        Some("text/csv")
    );

    // The blob is a byte-exact CSV rendering of the transformed table.
    let bytes = store.download(&bucket, &objects[0]).await?;
    let blob_table = Table::from_csv(&bytes)?;
    assert_eq!(
        blob_table.headers(),
        &[
            "date",
            "sales_amount",
            "quantity",
            "product",
            "customer_region",
            "month",
            "total_value"
        ]
    );
    assert_eq!(blob_table.num_rows(), 1);
    let month = blob_table.column_index("month").unwrap();
    let total = blob_table.column_index("total_value").unwrap();
    assert_eq!(blob_table.value(0, month), "2024-01");
    assert_eq!(blob_table.value(0, total), "200");
    assert_eq!(bytes, blob_table.to_csv()?.into_bytes());

    // Warehouse row count matches the table at load time.
    assert!(warehouse.has_dataset("sales_etl").await);
    assert_eq!(warehouse.row_count("sales_etl", "sales_data").await, Some(1));

    // Query A sees the scenario row.
    let rows = warehouse
        .query("SELECT product FROM `demo-project.sales_etl.sales_data` GROUP BY product")
        .await?;
    assert_eq!(
        rows,
        vec![ReportRow {
            label: "X".into(),
            total_sales: 200.0,
            metric: 1.0,
        }]
    );
    Ok(())
}

#[tokio::test]
async fn reruns_truncate_the_warehouse_table() -> Result<()> {
    let store = MemoryObjectStore::new();
    let warehouse = MemoryWarehouse::new();
    let pipeline = Pipeline::new(
        config(),
        Arc::new(store.clone()),
        Arc::new(warehouse.clone()),
    );

    let first = write_source(
        "date,sales_amount,quantity,product,customer_region\n\
         2024-01-15,100,2,X,East\n\
         2024-01-16,50,1,Y,West\n\
         2024-01-17,25,4,X,East\n",
    )?;
    pipeline.run(first.path()).await?;
    assert_eq!(warehouse.row_count("sales_etl", "sales_data").await, Some(3));

    let second = write_source(SINGLE_ROW)?;
    pipeline.run(second.path()).await?;
    assert_eq!(warehouse.row_count("sales_etl", "sales_data").await, Some(1));

    // Blobs are uniquely named per run, so both survive in the day's bucket.
    let bucket = config().bucket_name(Utc::now().date_naive());
    assert!(!store.object_names(&bucket).await.is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_date_column_fails_before_any_load() -> Result<()> {
    let source = write_source("sales_amount,quantity,product,customer_region\n100,2,X,East\n")?;
    let store = MemoryObjectStore::new();
    let warehouse = MemoryWarehouse::new();
    let pipeline = Pipeline::new(
        config(),
        Arc::new(store.clone()),
        Arc::new(warehouse.clone()),
    );

    let err = pipeline.run(source.path()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Parse(_)));

    let bucket = config().bucket_name(Utc::now().date_naive());
    assert!(!store.bucket_exists(&bucket).await?);
    assert!(!warehouse.has_dataset("sales_etl").await);
    Ok(())
}

/// Warehouse whose loads always fail, for exercising mid-pipeline aborts.
#[derive(Clone, Default)]
struct FailingWarehouse {
    queried: Arc<std::sync::atomic::AtomicBool>,
}

#[async_trait]
impl Warehouse for FailingWarehouse {
    async fn ensure_dataset(&self, _dataset: &str, _location: &str) -> Result<(), WarehouseError> {
        Ok(())
    }

    async fn load_table(
        &self,
        _dataset: &str,
        _table: &str,
        _data: &Table,
        _source: &BlobRef,
    ) -> Result<(), WarehouseError> {
        Err(WarehouseError::Load("network unreachable".into()))
    }

    async fn query(&self, _sql: &str) -> Result<Vec<ReportRow>, WarehouseError> {
        self.queried
            .store(true, std::sync::atomic::Ordering::SeqCst);
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn warehouse_failure_aborts_run_but_keeps_the_blob() -> Result<()> {
    let source = write_source(SINGLE_ROW)?;
    let store = MemoryObjectStore::new();
    let warehouse = FailingWarehouse::default();
    let pipeline = Pipeline::new(
        config(),
        Arc::new(store.clone()),
        Arc::new(warehouse.clone()),
    );

    let err = pipeline.run(source.path()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Warehouse(_)));

    // The reporter never ran.
    assert!(!warehouse.queried.load(std::sync::atomic::Ordering::SeqCst));

    // The already-uploaded blob is not rolled back.
    let bucket = config().bucket_name(Utc::now().date_naive());
    assert_eq!(store.object_names(&bucket).await.len(), 1);
    Ok(())
}
