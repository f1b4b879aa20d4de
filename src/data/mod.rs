//! Tabular input model
//!
//! Rows arrive as string-keyed records whose cells hold either text or a number.
//! Nothing upstream is trusted: every cell the engine reads is converted through a
//! [`CoercionMode`], which decides whether an unparsable cell becomes `0.0` or fails.

mod summary;

pub use summary::{ColumnKind, ColumnSummary, DataSummary};

use crate::error::{Result, TabsightError};
use crate::utils::{dataframe_to_dataset, DataLoader};
use ndarray::Array2;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// A single raw cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Numeric view of the cell. Text is trimmed before parsing; non-finite values
    /// count as unparsable.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(v) => Some(*v).filter(|v| v.is_finite()),
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.as_f64().is_some()
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(v) => write!(f, "{}", v),
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Number(v)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

/// One row: column name to raw cell
pub type Record = BTreeMap<String, CellValue>;

/// How cells that fail numeric parsing are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoercionMode {
    /// Unparsable or missing cells become `0.0` and are counted in a warning
    #[default]
    Lenient,
    /// The first unparsable or missing cell fails with [`TabsightError::DataError`]
    Strict,
}

/// Ordered sequence of records. Row order defines the train/test boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Parse a JSON array of objects
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Copy a polars frame cell by cell; nulls are left out of the record
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        dataframe_to_dataset(df)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    pub fn push(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Union of column names across all records, sorted
    pub fn column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .records
            .iter()
            .flat_map(|r| r.keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.records.iter().any(|r| r.contains_key(name))
    }

    /// Coerce one column to floats, in row order
    pub fn numeric_column(&self, name: &str, mode: CoercionMode) -> Result<Vec<f64>> {
        if mode == CoercionMode::Strict && !self.has_column(name) {
            return Err(TabsightError::FeatureNotFound(name.to_string()));
        }

        let mut coerced = 0usize;
        let mut values = Vec::with_capacity(self.records.len());

        for (row, record) in self.records.iter().enumerate() {
            match record.get(name).and_then(CellValue::as_f64) {
                Some(v) => values.push(v),
                None => match mode {
                    CoercionMode::Lenient => {
                        coerced += 1;
                        values.push(0.0);
                    }
                    CoercionMode::Strict => {
                        let shown = record
                            .get(name)
                            .map(|c| format!("{:?}", c.to_string()))
                            .unwrap_or_else(|| "<missing>".to_string());
                        return Err(TabsightError::DataError(format!(
                            "row {}, column '{}': value {} is not numeric",
                            row, name, shown
                        )));
                    }
                },
            }
        }

        if coerced > 0 {
            warn!(column = name, coerced, rows = self.records.len(), "Non-numeric cells coerced to 0.0");
        }

        Ok(values)
    }

    /// Coerce the named columns into a row-major matrix, columns in the given order
    pub fn numeric_matrix(&self, columns: &[String], mode: CoercionMode) -> Result<Array2<f64>> {
        let col_data: Vec<Vec<f64>> = columns
            .iter()
            .map(|name| self.numeric_column(name, mode))
            .collect::<Result<_>>()?;

        Ok(Array2::from_shape_fn((self.records.len(), columns.len()), |(i, j)| {
            col_data[j][i]
        }))
    }
}

impl From<Vec<Record>> for Dataset {
    fn from(records: Vec<Record>) -> Self {
        Self::new(records)
    }
}

impl FromIterator<Record> for Dataset {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Read a CSV (or `.tsv`) file with a header row
pub fn load_csv(path: impl AsRef<std::path::Path>) -> Result<Dataset> {
    DataLoader::new().load_dataset(path)
}

/// Build a record from `(column, value)` pairs
pub fn record<K, V, I>(cells: I) -> Record
where
    K: Into<String>,
    V: Into<CellValue>,
    I: IntoIterator<Item = (K, V)>,
{
    cells.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}
