//! Property-backed similarity computers.

use std::sync::Arc;

use super::{SimilarityFunction, metric::SimilarityMetric};
use crate::error::SimilarityError;

/// Similarity over a single numeric property: `1 / (1 + |a - b|)`.
///
/// A `NaN` property value marks the node as missing the property; every
/// comparison involving it yields `NaN`.
///
/// # Examples
/// ```
/// use nndescent_core::{ScalarSimilarity, SimilarityFunction};
///
/// let sim = ScalarSimilarity::new("age", vec![23.0, 24.0, f64::NAN]);
/// assert_eq!(sim.similarity(0, 1)?, 0.5);
/// assert!(sim.similarity(0, 2)?.is_nan());
/// # Ok::<(), nndescent_core::SimilarityError>(())
/// ```
#[derive(Clone, Debug)]
pub struct ScalarSimilarity {
    name: Arc<str>,
    values: Vec<f64>,
}

impl ScalarSimilarity {
    /// Creates a computer over one value per node.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Returns the number of nodes with a stored value.
    #[must_use]
    #[rustfmt::skip]
    pub fn len(&self) -> usize { self.values.len() }

    /// Returns whether no values are stored.
    #[must_use]
    #[rustfmt::skip]
    pub fn is_empty(&self) -> bool { self.values.is_empty() }

    fn value(&self, index: usize) -> Result<f64, SimilarityError> {
        self.values
            .get(index)
            .copied()
            .ok_or(SimilarityError::OutOfBounds { index })
    }
}

impl SimilarityFunction for ScalarSimilarity {
    fn name(&self) -> &str {
        &self.name
    }

    fn similarity(&self, a: usize, b: usize) -> Result<f64, SimilarityError> {
        let left = self.value(a)?;
        let right = self.value(b)?;
        Ok(1.0 / (1.0 + (left - right).abs()))
    }
}

/// Similarity over a vector property using a [`SimilarityMetric`].
///
/// Nodes without the property are represented by an empty vector and never
/// produce a valid comparison.
///
/// # Examples
/// ```
/// use nndescent_core::{SimilarityFunction, SimilarityMetric, VectorSimilarity};
///
/// let sim = VectorSimilarity::new(
///     "embedding",
///     vec![vec![1.0, 0.0], vec![1.0, 0.0], vec![]],
///     SimilarityMetric::Cosine,
/// );
/// assert!((sim.similarity(0, 1)? - 1.0).abs() < 1e-12);
/// assert!(sim.similarity(0, 2)?.is_nan());
/// # Ok::<(), nndescent_core::SimilarityError>(())
/// ```
#[derive(Clone, Debug)]
pub struct VectorSimilarity {
    name: Arc<str>,
    vectors: Vec<Vec<f64>>,
    metric: SimilarityMetric,
}

impl VectorSimilarity {
    /// Creates a computer over one vector per node.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, vectors: Vec<Vec<f64>>, metric: SimilarityMetric) -> Self {
        Self {
            name: name.into(),
            vectors,
            metric,
        }
    }

    /// Returns the metric applied to vector pairs.
    #[must_use]
    #[rustfmt::skip]
    pub fn metric(&self) -> SimilarityMetric { self.metric }

    /// Returns the number of nodes with a stored vector.
    #[must_use]
    #[rustfmt::skip]
    pub fn len(&self) -> usize { self.vectors.len() }

    /// Returns whether no vectors are stored.
    #[must_use]
    #[rustfmt::skip]
    pub fn is_empty(&self) -> bool { self.vectors.is_empty() }

    fn vector(&self, index: usize) -> Result<&[f64], SimilarityError> {
        self.vectors
            .get(index)
            .map(Vec::as_slice)
            .ok_or(SimilarityError::OutOfBounds { index })
    }
}

impl SimilarityFunction for VectorSimilarity {
    fn name(&self) -> &str {
        &self.name
    }

    fn similarity(&self, a: usize, b: usize) -> Result<f64, SimilarityError> {
        self.metric.compute(self.vector(a)?, self.vector(b)?)
    }
}

/// Averages several similarity computers, one per property.
///
/// Components that cannot compare a pair contribute zero instead of turning
/// the whole result into `NaN`, so nodes missing one of several properties are
/// still comparable on the others.
///
/// # Examples
/// ```
/// use nndescent_core::{CombinedSimilarity, ScalarSimilarity, SimilarityFunction};
///
/// let sim = CombinedSimilarity::new(
///     "knn+prop",
///     vec![
///         Box::new(ScalarSimilarity::new("knn", vec![1.2, 1.1])),
///         Box::new(ScalarSimilarity::new("prop", vec![1.0, f64::NAN])),
///     ],
/// );
/// let expected = 0.5 * (1.0 / 1.1);
/// assert!((sim.similarity(0, 1)? - expected).abs() < 1e-9);
/// # Ok::<(), nndescent_core::SimilarityError>(())
/// ```
pub struct CombinedSimilarity {
    name: Arc<str>,
    components: Vec<Box<dyn SimilarityFunction + Send>>,
}

impl CombinedSimilarity {
    /// Creates a combined computer. An empty component list never produces a
    /// valid comparison.
    #[must_use]
    pub fn new(
        name: impl Into<Arc<str>>,
        components: Vec<Box<dyn SimilarityFunction + Send>>,
    ) -> Self {
        Self {
            name: name.into(),
            components,
        }
    }
}

impl std::fmt::Debug for CombinedSimilarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombinedSimilarity")
            .field("name", &self.name)
            .field(
                "components",
                &self
                    .components
                    .iter()
                    .map(|component| component.name())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl SimilarityFunction for CombinedSimilarity {
    fn name(&self) -> &str {
        &self.name
    }

    fn similarity(&self, a: usize, b: usize) -> Result<f64, SimilarityError> {
        if self.components.is_empty() {
            return Ok(f64::NAN);
        }
        let mut total = 0.0;
        for component in &self.components {
            let value = component.similarity(a, b)?;
            if value.is_finite() {
                total += value;
            }
        }
        Ok(total / self.components.len() as f64)
    }

    fn is_symmetric(&self) -> bool {
        self.components
            .iter()
            .all(|component| component.is_symmetric())
    }
}
