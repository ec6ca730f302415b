//! Benchmark setup error type.

use nndescent_core::{KnnError, SimilarityError};

use crate::source::SyntheticError;

/// Errors that may occur while preparing or scoring a benchmark run.
#[derive(Debug, thiserror::Error)]
pub enum BenchSetupError {
    /// Synthetic data generation failed.
    #[error("synthetic source generation failed: {0}")]
    Synthetic(#[from] SyntheticError),
    /// Graph construction or configuration failed.
    #[error("knn computation failed: {0}")]
    Knn(#[from] KnnError),
    /// The recall oracle could not evaluate a pair.
    #[error("oracle similarity failed: {0}")]
    Similarity(#[from] SimilarityError),
}
