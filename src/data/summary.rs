//! Dataset summary handed to the conversational assistant as context.
//!
//! The assistant itself lives outside this crate; it only needs a compact textual
//! description of the columns plus a few sample rows.

use super::{CellValue, Dataset, Record};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write;

/// Observed content of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Numeric,
    Text,
    Mixed,
    Empty,
}

impl ColumnKind {
    fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Numeric => "numeric",
            ColumnKind::Text => "text",
            ColumnKind::Mixed => "mixed",
            ColumnKind::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    pub kind: ColumnKind,
    /// Minimum over numeric cells
    pub min: Option<f64>,
    /// Maximum over numeric cells
    pub max: Option<f64>,
    pub unique_count: usize,
    pub missing_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSummary {
    pub row_count: usize,
    pub columns: Vec<ColumnSummary>,
    pub sample: Vec<Record>,
}

impl DataSummary {
    /// Summarize every column and keep the first `sample_rows` records
    pub fn from_dataset(dataset: &Dataset, sample_rows: usize) -> Self {
        let columns = dataset
            .column_names()
            .into_iter()
            .map(|name| summarize_column(dataset, name))
            .collect();

        Self {
            row_count: dataset.len(),
            columns,
            sample: dataset.iter().take(sample_rows).cloned().collect(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSummary> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Plain-text rendering used as prompt context
    pub fn to_prompt_context(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Dataset with {} rows and {} columns.", self.row_count, self.columns.len());
        let _ = writeln!(out, "Columns:");

        for col in &self.columns {
            let _ = write!(out, "- {} ({}", col.name, col.kind.as_str());
            if let (Some(min), Some(max)) = (col.min, col.max) {
                let _ = write!(out, ", range {:.4} to {:.4}", min, max);
            }
            let _ = write!(out, ", {} unique", col.unique_count);
            if col.missing_count > 0 {
                let _ = write!(out, ", {} missing", col.missing_count);
            }
            let _ = writeln!(out, ")");
        }

        if !self.sample.is_empty() {
            let _ = writeln!(out, "Sample rows:");
            for row in &self.sample {
                let cells: Vec<String> = row.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                let _ = writeln!(out, "  {}", cells.join(", "));
            }
        }

        out
    }
}

fn summarize_column(dataset: &Dataset, name: String) -> ColumnSummary {
    let mut numeric = 0usize;
    let mut text = 0usize;
    let mut missing = 0usize;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut uniques: HashSet<String> = HashSet::new();

    for record in dataset.iter() {
        let cell = match record.get(&name) {
            Some(CellValue::Text(s)) if s.trim().is_empty() => None,
            other => other,
        };
        let Some(cell) = cell else {
            missing += 1;
            continue;
        };

        uniques.insert(cell.to_string());
        match cell.as_f64() {
            Some(v) => {
                numeric += 1;
                min = min.min(v);
                max = max.max(v);
            }
            None => text += 1,
        }
    }

    let kind = match (numeric, text) {
        (0, 0) => ColumnKind::Empty,
        (_, 0) => ColumnKind::Numeric,
        (0, _) => ColumnKind::Text,
        _ => ColumnKind::Mixed,
    };

    ColumnSummary {
        name,
        kind,
        min: (numeric > 0).then_some(min),
        max: (numeric > 0).then_some(max),
        unique_count: uniques.len(),
        missing_count: missing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record;

    #[test]
    fn test_column_kinds_and_ranges() {
        let ds = Dataset::new(vec![
            record([("age", CellValue::from(31.0)), ("city", CellValue::from("Oslo"))]),
            record([("age", CellValue::from("45")), ("city", CellValue::from("Rome"))]),
            record([("age", CellValue::from("")), ("city", CellValue::from(7.0))]),
        ]);

        let summary = DataSummary::from_dataset(&ds, 2);
        assert_eq!(summary.row_count, 3);
        assert_eq!(summary.sample.len(), 2);

        let age = summary.column("age").unwrap();
        assert_eq!(age.kind, ColumnKind::Numeric);
        assert_eq!(age.min, Some(31.0));
        assert_eq!(age.max, Some(45.0));
        assert_eq!(age.missing_count, 1);

        let city = summary.column("city").unwrap();
        assert_eq!(city.kind, ColumnKind::Mixed);
        assert_eq!(city.unique_count, 3);
    }

    #[test]
    fn test_prompt_context_mentions_columns() {
        let ds = Dataset::new(vec![record([("price", 10.0), ("size", 2.0)])]);
        let text = DataSummary::from_dataset(&ds, 5).to_prompt_context();
        assert!(text.contains("1 rows and 2 columns"));
        assert!(text.contains("- price (numeric, range 10.0000 to 10.0000, 1 unique)"));
        assert!(text.contains("price=10"));
    }
}
