use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use google_cloud_bigquery::client::{
    google_cloud_auth::credentials::CredentialsFile, Client, ClientConfig,
};
use google_cloud_bigquery::http::dataset::{Dataset, DatasetReference};
use google_cloud_bigquery::http::error::Error as BqError;
use google_cloud_bigquery::http::job::get::GetJobRequest;
use google_cloud_bigquery::http::job::query::QueryRequest;
use google_cloud_bigquery::http::job::{
    Job, JobConfiguration, JobConfigurationLoad, JobReference, JobState, JobType, WriteDisposition,
};
use google_cloud_bigquery::http::table::{SourceFormat, TableReference};
use google_cloud_bigquery::query::row::Row;
use tracing::debug;

use crate::cloud::{BlobRef, ReportRow, Warehouse};
use crate::error::WarehouseError;
use crate::table::Table;

/// BigQuery warehouse backend. Bulk loads run as CSV load jobs sourced from
/// the blob the storage stage just wrote, with truncate write disposition
/// and schema autodetection.
pub struct BigQueryWarehouse {
    client: Client,
    project_id: String,
}

impl BigQueryWarehouse {
    pub async fn new(credentials: &Path, project_id: &str) -> Result<Self, WarehouseError> {
        let creds = CredentialsFile::new_from_file(credentials.display().to_string())
            .await
            .map_err(|e| WarehouseError::Backend(format!("reading credentials: {e}")))?;
        let (config, _) = ClientConfig::new_with_credentials(creds)
            .await
            .map_err(|e| WarehouseError::Backend(format!("authenticating to BigQuery: {e}")))?;
        let client = Client::new(config)
            .await
            .map_err(|e| WarehouseError::Backend(e.to_string()))?;
        Ok(Self {
            client,
            project_id: project_id.to_string(),
        })
    }
}

fn is_not_found(err: &BqError) -> bool {
    matches!(err, BqError::Response(r) if r.code == 404)
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn ensure_dataset(&self, dataset: &str, location: &str) -> Result<(), WarehouseError> {
        match self.client.dataset().get(&self.project_id, dataset).await {
            Ok(_) => {
                debug!(dataset, "dataset exists");
                Ok(())
            }
            Err(e) if is_not_found(&e) => {
                let ds = Dataset {
                    dataset_reference: DatasetReference {
                        project_id: self.project_id.clone(),
                        dataset_id: dataset.to_string(),
                    },
                    location: location.to_string(),
                    ..Default::default()
                };
                self.client
                    .dataset()
                    .create(&ds)
                    .await
                    .map_err(|e| WarehouseError::Dataset(e.to_string()))?;
                debug!(dataset, location, "dataset created");
                Ok(())
            }
            Err(e) => Err(WarehouseError::Dataset(e.to_string())),
        }
    }

    async fn load_table(
        &self,
        dataset: &str,
        table: &str,
        _data: &Table,
        source: &BlobRef,
    ) -> Result<(), WarehouseError> {
        let job_id = format!("sales_etl_load_{}", Utc::now().timestamp_micros());
        let job = Job {
            job_reference: JobReference {
                project_id: self.project_id.clone(),
                job_id: job_id.clone(),
                location: None,
            },
            configuration: JobConfiguration {
                job: JobType::Load(JobConfigurationLoad {
                    source_uris: vec![source.uri()],
                    source_format: Some(SourceFormat::Csv),
                    skip_leading_rows: Some(1),
                    autodetect: Some(true),
                    write_disposition: Some(WriteDisposition::WriteTruncate),
                    destination_table: TableReference {
                        project_id: self.project_id.clone(),
                        dataset_id: dataset.to_string(),
                        table_id: table.to_string(),
                    },
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        };

        let mut created = self
            .client
            .job()
            .create(&job)
            .await
            .map_err(|e| WarehouseError::Load(e.to_string()))?;

        // Block until the load job settles.
        while created.status.state != JobState::Done {
            tokio::time::sleep(Duration::from_secs(1)).await;
            created = self
                .client
                .job()
                .get(&self.project_id, &job_id, &GetJobRequest::default())
                .await
                .map_err(|e| WarehouseError::Load(e.to_string()))?;
        }
        if let Some(err) = created.status.error_result {
            return Err(WarehouseError::Load(format!("{err:?}")));
        }
        debug!(dataset, table, %job_id, "load job done");
        Ok(())
    }

    async fn query(&self, sql: &str) -> Result<Vec<ReportRow>, WarehouseError> {
        let request = QueryRequest {
            query: sql.to_string(),
            use_legacy_sql: false,
            ..Default::default()
        };
        let mut rows = self
            .client
            .query::<Row>(&self.project_id, request)
            .await
            .map_err(|e| WarehouseError::Query(e.to_string()))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| WarehouseError::Query(e.to_string()))?
        {
            let label = row
                .column::<String>(0)
                .map_err(|e| WarehouseError::Query(e.to_string()))?;
            let total_sales = row
                .column::<f64>(1)
                .map_err(|e| WarehouseError::Query(e.to_string()))?;
            let metric = row
                .column::<f64>(2)
                .map_err(|e| WarehouseError::Query(e.to_string()))?;
            out.push(ReportRow {
                label,
                total_sales,
                metric,
            });
        }
        Ok(out)
    }
}
