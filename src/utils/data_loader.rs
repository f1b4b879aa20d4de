//! Data loading utilities
//!
//! The engine consumes [`Dataset`] only. This module is the ingestion adapter:
//! polars parses the file, then every column is copied cell by cell into records,
//! keeping string columns as text so the engine's own coercion policy applies.

use crate::data::{CellValue, Dataset, Record};
use crate::error::{Result, TabsightError};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use std::time::Instant;
use tracing::debug;

/// CSV loader
#[derive(Debug, Clone)]
pub struct DataLoader {
    /// Field separator
    delimiter: u8,
    /// Whether the first line holds column names
    has_header: bool,
    /// Rows used for schema inference
    infer_schema_length: usize,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            has_header: true,
            infer_schema_length: 1000,
        }
    }

    /// Set the field separator
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Set whether the file has a header row
    pub fn with_has_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Set how many rows polars inspects to infer column types
    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows;
        self
    }

    /// Load a CSV file into a DataFrame
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let file = File::open(path.as_ref())?;

        let parse_opts = CsvParseOptions::default().with_separator(self.delimiter);

        CsvReadOptions::default()
            .with_has_header(self.has_header)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| TabsightError::DataError(e.to_string()))
    }

    /// Load a CSV or TSV file straight into a [`Dataset`]
    pub fn load_dataset(&self, path: impl AsRef<Path>) -> Result<Dataset> {
        let path = path.as_ref();
        let start = Instant::now();

        let is_tsv = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("tsv"));
        let loader = if is_tsv {
            self.clone().with_delimiter(b'\t')
        } else {
            self.clone()
        };

        let df = loader.load_csv(path)?;
        let dataset = dataframe_to_dataset(&df)?;

        debug!(
            path = %path.display(),
            rows = dataset.len(),
            cols = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded dataset"
        );

        Ok(dataset)
    }
}

/// Copy a DataFrame into records. Nulls are left out of the record; string
/// columns stay text; every other dtype is cast to Float64.
pub fn dataframe_to_dataset(df: &DataFrame) -> Result<Dataset> {
    let n_rows = df.height();
    let mut records: Vec<Record> = vec![Record::new(); n_rows];

    for column in df.get_columns() {
        let series = column.as_materialized_series();
        let name = series.name().to_string();

        if matches!(series.dtype(), DataType::String) {
            let values = series.str()?;
            for (row, value) in values.into_iter().enumerate() {
                if let Some(s) = value {
                    records[row].insert(name.clone(), CellValue::Text(s.to_string()));
                }
            }
        } else {
            let cast = series.cast(&DataType::Float64)?;
            let values = cast.f64()?;
            for (row, value) in values.into_iter().enumerate() {
                if let Some(v) = value {
                    records[row].insert(name.clone(), CellValue::Number(v));
                }
            }
        }
    }

    Ok(Dataset::new(records))
}
