use chrono::{DateTime, NaiveDate, Utc};

/// Destination naming for one pipeline run. Threaded explicitly into the
/// pipeline and both cloud clients; nothing here is read from process-wide
/// environment state.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Cloud project owning the bucket and the dataset.
    pub project_id: String,
    /// Bucket name prefix; the current date is appended, so reruns on the
    /// same day share a bucket.
    pub bucket_prefix: String,
    pub dataset_id: String,
    pub table_id: String,
    /// Region for bucket and dataset creation.
    pub location: String,
}

impl PipelineConfig {
    /// Bucket for the given calendar day: `{prefix}-{YYYYMMDD}`.
    pub fn bucket_name(&self, date: NaiveDate) -> String {
        format!("{}-{}", self.bucket_prefix, date.format("%Y%m%d"))
    }

    /// Per-run blob name, second resolution: `sales_data_{YYYYMMDD_HHMMSS}.csv`.
    pub fn blob_name(&self, ts: DateTime<Utc>) -> String {
        format!("sales_data_{}.csv", ts.format("%Y%m%d_%H%M%S"))
    }

    /// Fully-qualified warehouse table for use inside SQL.
    pub fn qualified_table(&self) -> String {
        format!(
            "`{}.{}.{}`",
            self.project_id, self.dataset_id, self.table_id
        )
    }

    pub fn console_url(&self) -> String {
        format!(
            "https://console.cloud.google.com/bigquery?project={}",
            self.project_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cfg() -> PipelineConfig {
        PipelineConfig {
            project_id: "demo-project".into(),
            bucket_prefix: "sales-etl".into(),
            dataset_id: "sales_etl".into(),
            table_id: "sales_data".into(),
            location: "US".into(),
        }
    }

    #[test]
    fn bucket_name_is_day_scoped() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(cfg().bucket_name(date), "sales-etl-20240115");
    }

    #[test]
    fn blob_name_has_second_resolution() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 5).unwrap();
        assert_eq!(cfg().blob_name(ts), "sales_data_20240115_093005.csv");
    }

    #[test]
    fn qualified_table_targets_the_project() {
        assert_eq!(
            cfg().qualified_table(),
            "`demo-project.sales_etl.sales_data`"
        );
    }
}
