//! Tabsight - tabular regression training and evaluation
//!
//! Takes rows of string-keyed cells, a target column and feature columns, then
//! normalizes, splits by position, fits one of three regression backends and
//! scores the held-out rows.
//!
//! # Modules
//!
//! - [`data`] - Record/dataset model, lenient or strict numeric coercion, summaries
//! - [`preprocessing`] - Z-score normalization and positional train/test split
//! - [`training`] - Linear, tree-ensemble and neural-net backends, metrics, engine
//! - [`advisor`] - Model family and hyperparameter recommendations
//! - [`insights`] - Plain-text performance reports
//! - [`utils`] - CSV ingestion and column statistics
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use tabsight::prelude::*;
//!
//! # fn main() -> tabsight::Result<()> {
//! let rows = tabsight::data::load_csv("houses.csv")?;
//! let config = TrainingConfig::new("price", ["size", "rooms"], ModelType::Linear);
//! let result = train_model(&rows, &config)?;
//! println!("{}", result.insights());
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Data model and preparation
pub mod data;
pub mod preprocessing;

// Models and evaluation
pub mod training;
pub mod advisor;
pub mod insights;

// Utilities
pub mod utils;

// Services
pub mod cli;

pub use error::{Result, TabsightError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, TabsightError};

    // Data
    pub use crate::data::{CellValue, CoercionMode, DataSummary, Dataset, Record};

    // Preprocessing
    pub use crate::preprocessing::{NormalizationStats, Preprocessor};

    // Training
    pub use crate::training::{
        analyze_results, compare_models, get_model_suggestions, train_model, train_model_with,
        EpochProgress, MetricSet, ModelComparison, ModelSpec, ModelType, TrainOptions, TrainingConfig,
        TrainingResult,
    };

    // Advisor
    pub use crate::advisor::{DataAnalysis, ModelSuggestion};
}
