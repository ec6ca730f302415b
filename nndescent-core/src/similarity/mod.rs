//! Similarity abstractions consumed by the NN-descent engine.
//!
//! The engine never looks at node properties directly; it only asks a
//! [`SimilarityFunction`] for the similarity of two node identifiers. The
//! property-backed computers in this module cover the common cases of scalar
//! and vector properties.

mod metric;
mod property;

pub use self::{
    metric::SimilarityMetric,
    property::{CombinedSimilarity, ScalarSimilarity, VectorSimilarity},
};

use crate::error::SimilarityError;

/// Pairwise similarity over a dense node population.
///
/// Higher values mean "more similar". Implementations return `Ok(f64::NAN)`
/// when two nodes cannot be compared (for example a missing property); such
/// pairs are simply never stored as neighbours. An `Err` aborts the whole
/// computation.
///
/// # Examples
/// ```
/// use nndescent_core::{SimilarityError, SimilarityFunction};
///
/// struct Scalar(Vec<f64>);
///
/// impl SimilarityFunction for Scalar {
///     fn name(&self) -> &str { "scalar" }
///     fn similarity(&self, a: usize, b: usize) -> Result<f64, SimilarityError> {
///         let x = self.0.get(a).ok_or(SimilarityError::OutOfBounds { index: a })?;
///         let y = self.0.get(b).ok_or(SimilarityError::OutOfBounds { index: b })?;
///         Ok(1.0 / (1.0 + (x - y).abs()))
///     }
/// }
///
/// let sim = Scalar(vec![1.0, 2.0]);
/// assert_eq!(sim.similarity(0, 1)?, 0.5);
/// assert!(sim.is_symmetric());
/// # Ok::<(), SimilarityError>(())
/// ```
pub trait SimilarityFunction: Sync {
    /// Returns a human-readable name used in diagnostics.
    fn name(&self) -> &str;

    /// Computes the similarity of `a` towards `b`.
    ///
    /// # Errors
    /// Returns a [`SimilarityError`] when the comparison cannot be performed
    /// at all. Implementations should return [`SimilarityError::OutOfBounds`]
    /// for unknown node identifiers.
    fn similarity(&self, a: usize, b: usize) -> Result<f64, SimilarityError>;

    /// Whether `similarity(a, b) == similarity(b, a)` for every pair.
    ///
    /// Symmetric functions are evaluated once per compared pair.
    fn is_symmetric(&self) -> bool {
        true
    }
}

impl<S: SimilarityFunction + ?Sized> SimilarityFunction for &S {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn similarity(&self, a: usize, b: usize) -> Result<f64, SimilarityError> {
        (**self).similarity(a, b)
    }

    fn is_symmetric(&self) -> bool {
        (**self).is_symmetric()
    }
}

impl<S: SimilarityFunction + ?Sized> SimilarityFunction for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn similarity(&self, a: usize, b: usize) -> Result<f64, SimilarityError> {
        (**self).similarity(a, b)
    }

    fn is_symmetric(&self) -> bool {
        (**self).is_symmetric()
    }
}
