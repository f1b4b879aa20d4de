//! Model training module
//!
//! Three regression backends behind one [`Regressor`] trait:
//! - Linear: multivariate ordinary least squares
//! - Tree ensemble: bagged regression trees built in parallel
//! - Neural net: MLP trained with Adam, with progress callbacks and cancellation
//!
//! [`TrainEngine`] ties preprocessing, fitting and held-out evaluation together.

mod config;
mod engine;
mod metrics;
mod models;
pub mod decision_tree;
pub mod linear_models;
pub mod neural_network;
pub mod random_forest;

pub(crate) use config::validate_columns;
pub use config::{
    LinearParams, ModelSpec, ModelType, NeuralNetParams, TrainingConfig, TreeEnsembleParams,
};
pub use decision_tree::{DecisionTree, TreeNode};
pub use engine::{
    analyze_results, compare_models, get_model_suggestions, train_model, train_model_with,
    ModelComparison, TrainEngine, TrainingResult,
};
pub use linear_models::LinearRegression;
pub use metrics::MetricSet;
pub use models::{build_regressor, Regressor, TrainOptions};
pub use neural_network::{EpochObserver, EpochProgress, MLPRegressor};
pub use random_forest::RandomForest;
