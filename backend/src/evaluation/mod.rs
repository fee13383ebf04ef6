//! Offline scoring of the classifiers against a labelled test set.
//!
//! The test set layout is one sub-directory per class; sorted directory names give the
//! label indices, which matches the order the classifiers were trained with.

pub mod dataset;
pub mod metrics;
pub mod runner;

use std::path::PathBuf;

use crate::inference::ModelError;

pub use dataset::{discover_dataset, Dataset, Sample};
pub use metrics::{ClassMetrics, ConfusionMatrix};
pub use runner::{evaluate, EvaluationReport, ModelSummary};

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("No labelled images found under {}", .0.display())]
    EmptyDataset(PathBuf),
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
    #[error("Failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),
}
