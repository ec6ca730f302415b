//! Synthetic vector populations for benchmarking.
//!
//! Vectors are drawn uniformly from the unit hypercube with a seeded RNG so
//! every benchmark run sees the same population.

use nndescent_core::{SimilarityMetric, VectorSimilarity};
use rand::{Rng, SeedableRng, rngs::SmallRng};

/// Errors that may occur during synthetic source generation.
#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum SyntheticError {
    /// The requested point count was below two.
    #[error("point count must be at least 2 (got {0})")]
    TooFewPoints(usize),
    /// The requested dimension count was zero.
    #[error("dimension count must be greater than zero")]
    ZeroDimensions,
}

/// Configuration for synthetic vector generation.
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    /// Number of points to generate.
    pub point_count: usize,
    /// Dimensionality of each vector.
    pub dimensions: usize,
    /// RNG seed for reproducibility.
    pub seed: u64,
}

/// Generates a Euclidean [`VectorSimilarity`] over random vectors.
///
/// # Errors
/// Returns [`SyntheticError`] for fewer than two points or zero dimensions.
///
/// # Examples
///
/// ```
/// use nndescent_benches::source::{SyntheticConfig, generate};
///
/// let config = SyntheticConfig { point_count: 10, dimensions: 4, seed: 42 };
/// let similarity = generate(&config).expect("valid config");
/// assert_eq!(similarity.len(), 10);
/// ```
pub fn generate(config: &SyntheticConfig) -> Result<VectorSimilarity, SyntheticError> {
    if config.point_count < 2 {
        return Err(SyntheticError::TooFewPoints(config.point_count));
    }
    if config.dimensions == 0 {
        return Err(SyntheticError::ZeroDimensions);
    }

    let mut rng = SmallRng::seed_from_u64(config.seed);
    let vectors = (0..config.point_count)
        .map(|_| {
            (0..config.dimensions)
                .map(|_| rng.gen_range(0.0..1.0))
                .collect()
        })
        .collect();
    Ok(VectorSimilarity::new(
        "synthetic",
        vectors,
        SimilarityMetric::Euclidean,
    ))
}
