//! Integration tests for data loading, summaries and training from files

use std::io::Write;
use tabsight::data::{load_csv, CellValue, ColumnKind, DataSummary, Dataset};
use tabsight::training::{train_model, ModelType, TrainingConfig};

fn write_csv(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_csv_to_summary() {
    let file = write_csv("size,rooms,label\n10.5,2,cheap\n20,3,pricey\n,4,\n");
    let dataset = load_csv(file.path()).unwrap();
    assert_eq!(dataset.len(), 3);

    let summary = DataSummary::from_dataset(&dataset, 2);
    assert_eq!(summary.row_count, 3);
    assert_eq!(summary.sample.len(), 2);

    let size = summary.column("size").unwrap();
    assert_eq!(size.kind, ColumnKind::Numeric);
    assert_eq!(size.min, Some(10.5));
    assert_eq!(size.max, Some(20.0));
    assert_eq!(size.missing_count, 1);

    let label = summary.column("label").unwrap();
    assert_eq!(label.kind, ColumnKind::Text);
    assert_eq!(label.unique_count, 2);

    let context = summary.to_prompt_context();
    assert!(context.starts_with("Dataset with 3 rows and 3 columns."));
    assert!(context.contains("- rooms (numeric, range 2.0000 to 4.0000, 3 unique)"));
    assert!(context.contains("Sample rows:"));
}

#[test]
fn test_tsv_detected_by_extension() {
    let mut file = tempfile::Builder::new().suffix(".tsv").tempfile().unwrap();
    file.write_all(b"x\ty\n1\t2\n2\t4\n").unwrap();
    file.flush().unwrap();

    let dataset = load_csv(file.path()).unwrap();
    assert_eq!(dataset.records()[1]["y"], CellValue::Number(4.0));
}

#[test]
fn test_train_from_csv() {
    let mut contents = String::from("x,label,y\n");
    for i in 0..20 {
        contents.push_str(&format!("{},row{},{}\n", i, i, 5.0 * i as f64 - 2.0));
    }
    let file = write_csv(&contents);

    let dataset = load_csv(file.path()).unwrap();
    let config = TrainingConfig::new("y", ["x"], ModelType::Linear);
    let result = train_model(&dataset, &config).unwrap();

    assert_eq!(result.test_rows, 4);
    assert!(result.metrics.r2 > 0.999);
}

#[test]
fn test_json_rows() {
    let dataset = Dataset::from_json(r#"[{"x": 1, "y": "2.5"}, {"x": "3", "y": 4}]"#).unwrap();
    assert_eq!(dataset.len(), 2);
    assert_eq!(dataset.column_names(), vec!["x", "y"]);
    assert_eq!(dataset.records()[0]["y"].as_f64(), Some(2.5));
}
