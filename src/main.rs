use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use sales_etl::cloud::bigquery::BigQueryWarehouse;
use sales_etl::cloud::gcs::GcsStore;
use sales_etl::config::PipelineConfig;
use sales_etl::error::PipelineError;
use sales_etl::pipeline::Pipeline;

/// Move a local sales file through validation and enrichment into cloud
/// storage and the warehouse, then print the two standing reports.
#[derive(Parser, Debug)]
struct Args {
    /// Delimited sales data file to ingest
    #[arg(long, default_value = "sample_sales_data.csv")]
    data_file: PathBuf,

    /// Service account credentials JSON
    #[arg(long)]
    credentials: PathBuf,

    /// Cloud project id; defaults to the project_id in the credentials file
    #[arg(long)]
    project: Option<String>,

    /// Bucket name prefix; the current date is appended
    #[arg(long, default_value = "sales-etl")]
    bucket_prefix: String,

    /// Warehouse dataset
    #[arg(long, default_value = "sales_etl")]
    dataset: String,

    /// Warehouse table
    #[arg(long, default_value = "sales_data")]
    table: String,

    /// Region for bucket and dataset creation
    #[arg(long, default_value = "US")]
    location: String,
}

/// Pull the project id out of the service account JSON when none was given
/// on the command line.
fn project_from_credentials(path: &PathBuf) -> Result<String, PipelineError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| PipelineError::Init(format!("reading credentials: {e}")))?;
    let json: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| PipelineError::Init(format!("credentials are not valid JSON: {e}")))?;
    json.get("project_id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            PipelineError::Init("credentials file has no project_id; pass --project".to_string())
        })
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let args = Args::parse();

    if !args.credentials.exists() {
        error!(path = %args.credentials.display(), "credentials file not found");
        std::process::exit(1);
    }
    if !args.data_file.exists() {
        error!(path = %args.data_file.display(), "data file not found");
        std::process::exit(1);
    }

    let project_id = match args.project.clone() {
        Some(p) => p,
        None => project_from_credentials(&args.credentials)
            .context("resolving project id from credentials")?,
    };
    info!(project = %project_id, "configuration resolved");

    let config = PipelineConfig {
        project_id,
        bucket_prefix: args.bucket_prefix,
        dataset_id: args.dataset,
        table_id: args.table,
        location: args.location,
    };

    let store = GcsStore::new(&args.credentials, &config.project_id)
        .await
        .context("initializing storage client")?;
    let warehouse = BigQueryWarehouse::new(&args.credentials, &config.project_id)
        .await
        .context("initializing warehouse client")?;

    let console_url = config.console_url();
    let pipeline = Pipeline::new(config, Arc::new(store), Arc::new(warehouse));

    match pipeline.run(&args.data_file).await {
        Ok(()) => {
            println!("ETL pipeline completed successfully");
            println!("Data available at: {console_url}");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "pipeline execution failed");
            std::process::exit(1);
        }
    }
}
