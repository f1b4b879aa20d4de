//! Integration test: Training pipeline end-to-end

use polars::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tabsight::data::{record, CellValue, CoercionMode, Dataset};
use tabsight::training::{
    analyze_results, compare_models, train_model, train_model_with, EpochProgress, ModelSpec,
    ModelType, NeuralNetParams, TrainOptions, TrainingConfig, TreeEnsembleParams,
};
use tabsight::TabsightError;

/// y = 3x + 1 with rows interleaved so the test partition stays inside the training range
fn interleaved_linear_rows(n: usize) -> Dataset {
    (0..n)
        .map(|i| {
            let x = ((i * 7) % n) as f64;
            record([("x", x), ("noise", (i % 3) as f64), ("y", 3.0 * x + 1.0)])
        })
        .collect()
}

fn features(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_linear_recovers_identity() {
    let rows: Dataset = (1..=10)
        .map(|i| record([("x", i as f64), ("y", i as f64)]))
        .collect();
    let config = TrainingConfig::new("y", ["x"], ModelType::Linear);

    let result = train_model(&rows, &config).unwrap();
    assert_eq!(result.model_type, ModelType::Linear);
    assert_eq!(result.test_rows, 2);
    assert!((result.metrics.r2 - 1.0).abs() < 1e-9);
    assert!(result.accuracy_percentage() > 99.9);
}

#[test]
fn test_linear_multivariate() {
    let rows: Dataset = (0..30)
        .map(|i| {
            let a = i as f64;
            let b = ((i * 5) % 7) as f64;
            record([("a", a), ("b", b), ("y", 2.0 * a - 3.0 * b + 4.0)])
        })
        .collect();
    let config = TrainingConfig::new("y", ["a", "b"], ModelType::Linear);

    let result = train_model(&rows, &config).unwrap();
    for (p, a) in result.predictions.iter().zip(&result.actuals) {
        assert!((p - a).abs() < 1e-6, "prediction {} vs actual {}", p, a);
    }
}

#[test]
fn test_tree_ensemble_fits_interpolation() {
    let config = TrainingConfig::new("y", ["x", "noise"], ModelType::TreeEnsemble).with_model(
        ModelSpec::TreeEnsemble(TreeEnsembleParams {
            num_trees: 30,
            ..Default::default()
        }),
    );

    let result = train_model(&interleaved_linear_rows(40), &config).unwrap();
    assert_eq!(result.train_rows, 32);
    assert_eq!(result.test_rows, 8);
    assert!(result.metrics.r2 > 0.7, "r2 = {}", result.metrics.r2);
}

#[test]
fn test_tree_ensemble_is_deterministic_per_seed() {
    let rows = interleaved_linear_rows(40);
    let config = TrainingConfig::new("y", ["x", "noise"], ModelType::TreeEnsemble).with_seed(9);

    let first = train_model(&rows, &config).unwrap();
    let second = train_model(&rows, &config).unwrap();
    assert_eq!(first.predictions, second.predictions);
}

#[test]
fn test_neural_net_reports_every_epoch() {
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);

    let config = TrainingConfig::new("y", ["x"], ModelType::NeuralNet).with_model(ModelSpec::NeuralNet(
        NeuralNetParams {
            hidden_layers: vec![8],
            epochs: 12,
            learning_rate: 0.01,
            ..Default::default()
        },
    ));
    let options = TrainOptions::new().with_observer(Box::new(move |p: &EpochProgress| {
        assert!(p.train_loss.is_finite());
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    let result = train_model_with(&interleaved_linear_rows(40), &config, options).unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 12);
    assert_eq!(result.predictions.len(), result.actuals.len());
    assert!(result.predictions.iter().all(|p| p.is_finite()));
}

#[test]
fn test_neural_net_cancellation() {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);

    let config = TrainingConfig::new("y", ["x"], ModelType::NeuralNet);
    let options = TrainOptions::new()
        .with_cancel_flag(Arc::clone(&cancel))
        .with_observer(Box::new(move |p: &EpochProgress| {
            if p.epoch == 3 {
                flag.store(true, Ordering::SeqCst);
            }
        }));

    let err = train_model_with(&interleaved_linear_rows(40), &config, options).unwrap_err();
    assert!(matches!(err, TabsightError::Cancelled { epoch: 3 }));
}

#[test]
fn test_validation_failures() {
    let rows = interleaved_linear_rows(10);

    let empty = train_model(&Dataset::default(), &TrainingConfig::new("y", ["x"], ModelType::Linear));
    assert!(matches!(empty, Err(TabsightError::ValidationError(_))));

    let no_features = TrainingConfig::new("y", Vec::<String>::new(), ModelType::Linear);
    assert!(matches!(train_model(&rows, &no_features), Err(TabsightError::ValidationError(_))));

    let target_as_feature = TrainingConfig::new("y", ["x", "y"], ModelType::Linear);
    assert!(matches!(
        train_model(&rows, &target_as_feature),
        Err(TabsightError::ValidationError(_))
    ));

    let zero_split = TrainingConfig::new("y", ["x"], ModelType::Linear).with_split_ratio(0.0);
    assert!(matches!(train_model(&rows, &zero_split), Err(TabsightError::ValidationError(_))));
}

#[test]
fn test_lenient_and_strict_coercion() {
    let mut rows = interleaved_linear_rows(10);
    rows.push(record([("x", CellValue::from("n/a")), ("y", CellValue::from(" 7 "))]));

    let lenient = TrainingConfig::new("y", ["x"], ModelType::Linear);
    assert!(train_model(&rows, &lenient).is_ok());

    let strict = lenient.with_coercion(CoercionMode::Strict);
    assert!(matches!(train_model(&rows, &strict), Err(TabsightError::DataError(_))));
}

#[test]
fn test_compare_models_ranks_all_families() {
    let comparisons =
        compare_models(&interleaved_linear_rows(40), "y", &features(&["x", "noise"]), 0.8).unwrap();

    assert_eq!(comparisons.len(), 3);
    assert!(comparisons
        .windows(2)
        .all(|w| w[0].accuracy_pct >= w[1].accuracy_pct));
    assert_eq!(comparisons[0].model_type, ModelType::Linear);
}

#[test]
fn test_train_from_dataframe() {
    let df = df!(
        "x1" => &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0],
        "x2" => &["5", "3", "8", "1", "9", "2", "7", "4", "6", "0"],
        "target" => &[3.0, 6.0, 9.0, 12.0, 15.0, 18.0, 21.0, 24.0, 27.0, 30.0]
    )
    .unwrap();

    let rows = Dataset::from_dataframe(&df).unwrap();
    let config = TrainingConfig::new("target", ["x1", "x2"], ModelType::Linear);
    let result = train_model(&rows, &config).unwrap();
    assert!(result.metrics.r2 > 0.99);
}

#[test]
fn test_json_config_and_result_round_trip() {
    let config = TrainingConfig::from_json(
        r#"{"target": "y", "features": ["x"], "model": {"type": "linear"}, "split_ratio": 0.7}"#,
    )
    .unwrap();
    let result = train_model(&interleaved_linear_rows(20), &config).unwrap();
    assert_eq!(result.test_rows, 6);

    let json = serde_json::to_string(&result).unwrap();
    assert!(json.contains("\"model_type\":\"linear\""));
}

#[test]
fn test_analyze_results_mentions_fit() {
    let result = train_model(
        &interleaved_linear_rows(20),
        &TrainingConfig::new("y", ["x"], ModelType::Linear),
    )
    .unwrap();

    let text = analyze_results(result.model_type, &result.metrics, &result.predictions, &result.actuals);
    assert!(text.starts_with("Strong fit"));
    assert_eq!(text, result.insights());
}
