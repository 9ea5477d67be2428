use tracing::{error, info};

use crate::cloud::{ReportRow, Warehouse};
use crate::config::PipelineConfig;
use crate::pipeline::format_currency;

enum ReportKind {
    TopProducts,
    RegionalSales,
}

struct ReportQuery {
    name: &'static str,
    kind: ReportKind,
    sql: String,
}

fn report_queries(config: &PipelineConfig) -> Vec<ReportQuery> {
    let table = config.qualified_table();
    vec![
        ReportQuery {
            name: "Top Performing Products",
            kind: ReportKind::TopProducts,
            sql: format!(
                "SELECT product, SUM(total_value) AS total_sales, COUNT(*) AS order_count \
                 FROM {table} GROUP BY product ORDER BY total_sales DESC LIMIT 5"
            ),
        },
        ReportQuery {
            name: "Regional Sales Performance",
            kind: ReportKind::RegionalSales,
            sql: format!(
                "SELECT customer_region, SUM(total_value) AS total_sales, \
                 AVG(sales_amount) AS avg_order_value \
                 FROM {table} GROUP BY customer_region ORDER BY total_sales DESC"
            ),
        },
    ]
}

fn format_row(kind: &ReportKind, row: &ReportRow) -> String {
    match kind {
        ReportKind::TopProducts => format!(
            "  {}: {} revenue ({} orders)",
            row.label,
            format_currency(row.total_sales),
            row.metric as i64
        ),
        ReportKind::RegionalSales => format!(
            "  {}: {} revenue (avg order: {})",
            row.label,
            format_currency(row.total_sales),
            format_currency(row.metric)
        ),
    }
}

/// Run both report queries against the freshly loaded table. A failing
/// query is logged and skipped; the other still runs, and report failures
/// never fail the pipeline.
pub async fn run_reports(warehouse: &dyn Warehouse, config: &PipelineConfig) {
    for query in report_queries(config) {
        info!(report = query.name, "executing report query");
        match warehouse.query(&query.sql).await {
            Ok(rows) => {
                for row in &rows {
                    println!("{}", format_row(&query.kind, row));
                }
            }
            Err(e) => {
                error!(report = query.name, error = %e, "report query failed");
            }
        }
    }
}
