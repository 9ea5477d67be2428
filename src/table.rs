use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, StringArray};
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use crate::error::PipelineError;

/// In-memory tabular data: ordered rows × named columns. Every cell is kept
/// as its source text (empty string = missing value); numeric and date
/// columns are parsed on access.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Read a delimited file into a Table. The header row names the columns;
    /// all cells come back as text regardless of their eventual warehouse type.
    pub fn from_csv_path(path: &Path) -> Result<Self, PipelineError> {
        let bytes = fs::read(path)
            .map_err(|e| PipelineError::Parse(format!("reading {}: {}", path.display(), e)))?;
        Self::from_csv(&bytes)
    }

    /// Parse CSV bytes into a Table. Ragged rows or undecodable content fail
    /// the whole parse.
    pub fn from_csv(bytes: &[u8]) -> Result<Self, PipelineError> {
        let format = Format::default().with_header(true);
        let (inferred, _) = format
            .infer_schema(Cursor::new(bytes), None)
            .map_err(|e| PipelineError::Parse(e.to_string()))?;

        // Re-read everything as Utf8 so cells keep their source text.
        let fields: Vec<Field> = inferred
            .fields()
            .iter()
            .map(|f| Field::new(f.name(), DataType::Utf8, true))
            .collect();
        let schema = Arc::new(Schema::new(fields));

        let reader = ReaderBuilder::new(schema.clone())
            .with_header(true)
            .build(Cursor::new(bytes))
            .map_err(|e| PipelineError::Parse(e.to_string()))?;

        let headers: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
        let mut rows = Vec::new();
        for batch in reader {
            let batch = batch.map_err(|e| PipelineError::Parse(e.to_string()))?;
            let columns: Vec<&StringArray> = batch
                .columns()
                .iter()
                .map(|c| {
                    c.as_any()
                        .downcast_ref::<StringArray>()
                        .ok_or_else(|| PipelineError::Parse("non-utf8 column".to_string()))
                })
                .collect::<Result<_, _>>()?;
            for i in 0..batch.num_rows() {
                let row = columns
                    .iter()
                    .map(|col| {
                        if col.is_null(i) {
                            String::new()
                        } else {
                            col.value(i).to_string()
                        }
                    })
                    .collect();
                rows.push(row);
            }
        }

        Ok(Self { headers, rows })
    }

    /// Serialize to CSV text: one header row then the data rows, no index
    /// column. Quoting only where the content requires it.
    pub fn to_csv(&self) -> Result<String, PipelineError> {
        let fields: Vec<Field> = self
            .headers
            .iter()
            .map(|h| Field::new(h, DataType::Utf8, true))
            .collect();
        let schema = Arc::new(Schema::new(fields));

        let arrays: Vec<ArrayRef> = (0..self.headers.len())
            .map(|c| {
                let values: Vec<&str> = self.rows.iter().map(|r| r[c].as_str()).collect();
                Arc::new(StringArray::from(values)) as ArrayRef
            })
            .collect();
        let batch = RecordBatch::try_new(schema, arrays)
            .map_err(|e| PipelineError::Parse(e.to_string()))?;

        let mut buf = Vec::new();
        {
            let mut writer = WriterBuilder::new().with_header(true).build(&mut buf);
            writer
                .write(&batch)
                .map_err(|e| PipelineError::Parse(e.to_string()))?;
        }
        String::from_utf8(buf).map_err(|e| PipelineError::Parse(e.to_string()))
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.headers.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn value(&self, row: usize, col: usize) -> &str {
        &self.rows[row][col]
    }

    /// Parse a cell as a number; `None` for empty or non-numeric content.
    pub fn number(&self, row: usize, col: usize) -> Option<f64> {
        self.rows[row][col].trim().parse::<f64>().ok()
    }

    /// Append a column. `values` must carry exactly one cell per row.
    pub fn push_column(&mut self, name: &str, values: Vec<String>) -> Result<(), PipelineError> {
        if values.len() != self.rows.len() {
            return Err(PipelineError::Parse(format!(
                "column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }
        self.headers.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
        Ok(())
    }

    /// Total count of missing (empty) cells across every column.
    pub fn null_count(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.iter().filter(|c| c.trim().is_empty()).count())
            .sum()
    }
}
