use chrono::NaiveDate;
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::pipeline::format_currency;
use crate::table::Table;

const REQUIRED_COLUMNS: [&str; 3] = ["date", "sales_amount", "quantity"];

/// Derive `month` and `total_value`, run the null-count quality check, and
/// log the validation summary. Missing cells stay missing: they flow through
/// both derivations as empty values and only feed the non-fatal null
/// warning. A genuinely malformed non-empty value (an unparseable date, a
/// non-numeric amount) fails the whole batch; no partial output is kept.
pub fn transform(table: &mut Table) -> Result<(), PipelineError> {
    for col in REQUIRED_COLUMNS {
        if table.column_index(col).is_none() {
            return Err(PipelineError::Parse(format!(
                "missing required column: {col}"
            )));
        }
    }
    let date_col = table.column_index("date").unwrap();
    let sales_col = table.column_index("sales_amount").unwrap();
    let qty_col = table.column_index("quantity").unwrap();

    let mut months = Vec::with_capacity(table.num_rows());
    for row in 0..table.num_rows() {
        let value = table.value(row, date_col);
        if value.trim().is_empty() {
            months.push(String::new());
            continue;
        }
        months.push(parse_month(value).ok_or_else(|| {
            PipelineError::Parse(format!("unparseable date {value:?} at row {row}"))
        })?);
    }

    let mut totals = Vec::with_capacity(table.num_rows());
    let mut sales_sum = 0.0;
    for row in 0..table.num_rows() {
        let sales = require_number(table, row, sales_col, "sales_amount")?;
        let quantity = require_number(table, row, qty_col, "quantity")?;
        match (sales, quantity) {
            (Some(sales), Some(quantity)) => {
                totals.push(format_number(sales * quantity));
                sales_sum += sales;
            }
            _ => {
                totals.push(String::new());
                sales_sum += sales.unwrap_or(0.0);
            }
        }
    }

    table.push_column("month", months)?;
    table.push_column("total_value", totals)?;

    let nulls = table.null_count();
    if nulls > 0 {
        warn!(nulls, "found missing values");
    }

    info!(
        transactions = table.num_rows(),
        total_sales = %format_currency(sales_sum),
        "data validation summary"
    );
    Ok(())
}

/// `Ok(None)` for a missing cell; `NonNumeric` only for non-empty content
/// that does not parse as a number.
fn require_number(
    table: &Table,
    row: usize,
    col: usize,
    column: &str,
) -> Result<Option<f64>, PipelineError> {
    let value = table.value(row, col);
    if value.trim().is_empty() {
        return Ok(None);
    }
    match table.number(row, col) {
        Some(n) => Ok(Some(n)),
        None => Err(PipelineError::NonNumeric {
            column: column.to_string(),
            row,
            value: value.to_string(),
        }),
    }
}

/// Year-month prefix of a date cell; dashed and slashed forms accepted.
fn parse_month(value: &str) -> Option<String> {
    let s = value.trim();
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
        .ok()?;
    Some(date.format("%Y-%m").to_string())
}

/// Keep integer products integer-exact; anything fractional keeps its
/// minimal decimal form.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
