//! Data preprocessing module
//!
//! Turns raw records into normalized ndarray partitions:
//! - numeric coercion of every feature and target cell
//! - z-score normalization with statistics over the whole dataset
//! - deterministic positional train/test split

mod pipeline;
mod scaler;

pub use pipeline::{PreparedData, Preprocessor};
pub use scaler::{NormalizationStats, StandardScaler};
