pub mod extract;
pub mod report;
pub mod transform;

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use crate::cloud::{BlobRef, ObjectStore, Warehouse};
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::table::Table;

/// The whole run: extract → transform → storage load → warehouse load →
/// report, strictly in that order. The first four stages are fatal on
/// failure; report queries are isolated per query.
pub struct Pipeline {
    config: PipelineConfig,
    store: Arc<dyn ObjectStore>,
    warehouse: Arc<dyn Warehouse>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn ObjectStore>,
        warehouse: Arc<dyn Warehouse>,
    ) -> Self {
        Self {
            config,
            store,
            warehouse,
        }
    }

    pub async fn run(&self, data_file: &Path) -> Result<(), PipelineError> {
        info!("starting pipeline run");

        let mut table = extract::extract(data_file).map_err(|e| {
            error!(stage = "extract", error = %e, "stage failed");
            e
        })?;

        transform::transform(&mut table).map_err(|e| {
            error!(stage = "transform", error = %e, "stage failed");
            e
        })?;

        let blob = self.load_to_storage(&table).await.map_err(|e| {
            error!(stage = "storage_load", error = %e, "stage failed");
            e
        })?;

        self.load_to_warehouse(&table, &blob).await.map_err(|e| {
            error!(stage = "warehouse_load", error = %e, "stage failed");
            e
        })?;

        report::run_reports(self.warehouse.as_ref(), &self.config).await;

        info!("pipeline run complete");
        Ok(())
    }

    /// Serialize the table and upload it as the run's blob, creating the
    /// day's bucket if this is the first run of the day.
    async fn load_to_storage(&self, table: &Table) -> Result<BlobRef, PipelineError> {
        let now = Utc::now();
        let bucket = self.config.bucket_name(now.date_naive());

        if self.store.bucket_exists(&bucket).await? {
            info!(%bucket, "using existing storage bucket");
        } else {
            self.store
                .create_bucket(&bucket, &self.config.location)
                .await?;
            info!(%bucket, location = %self.config.location, "created storage bucket");
        }

        let object = self.config.blob_name(now);
        let csv = table.to_csv()?;
        self.store
            .upload(&bucket, &object, csv.into_bytes(), "text/csv")
            .await?;
        info!(%bucket, %object, "uploaded table");

        Ok(BlobRef { bucket, object })
    }

    /// Truncate-and-load the table into the warehouse, creating the dataset
    /// on first use. Blocks until the load settles.
    async fn load_to_warehouse(&self, table: &Table, blob: &BlobRef) -> Result<(), PipelineError> {
        self.warehouse
            .ensure_dataset(&self.config.dataset_id, &self.config.location)
            .await?;

        self.warehouse
            .load_table(&self.config.dataset_id, &self.config.table_id, table, blob)
            .await?;
        info!(
            rows = table.num_rows(),
            dataset = %self.config.dataset_id,
            table = %self.config.table_id,
            "loaded table into warehouse"
        );
        Ok(())
    }
}

/// `$1,234,567.89` rendering for report and summary lines.
pub(crate) fn format_currency(amount: f64) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let frac = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if negative { "-" } else { "" };
    format!("{sign}${grouped}.{frac:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_groups_thousands() {
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(200.0), "$200.00");
        assert_eq!(format_currency(1234.5), "$1,234.50");
        assert_eq!(format_currency(1234567.891), "$1,234,567.89");
    }

    #[test]
    fn currency_handles_negatives() {
        assert_eq!(format_currency(-42.0), "-$42.00");
    }
}
