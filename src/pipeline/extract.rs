use std::path::Path;

use tracing::info;

use crate::error::PipelineError;
use crate::table::Table;

/// Read the source file into a Table. The driver has already checked the
/// path exists; anything unreadable or malformed is a parse failure.
pub fn extract(path: &Path) -> Result<Table, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::NotFound(path.to_path_buf()));
    }
    let table = Table::from_csv_path(path)?;
    info!(
        rows = table.num_rows(),
        columns = table.num_columns(),
        path = %path.display(),
        "loaded source file"
    );
    info!(columns = ?table.headers(), "source columns");
    Ok(table)
}
