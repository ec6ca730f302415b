//! Vector similarity kernels normalised into `[0, 1]`.

use std::cmp::Ordering;

use crate::error::SimilarityError;

/// Metric applied by [`crate::VectorSimilarity`] to a pair of property vectors.
///
/// Every metric yields a value in `[0, 1]` where `1` means identical. Empty
/// vectors, zero-magnitude vectors (cosine) and constant vectors (Pearson)
/// yield `NaN` because no meaningful comparison exists.
///
/// # Examples
/// ```
/// use nndescent_core::SimilarityMetric;
///
/// let same = SimilarityMetric::Cosine.compute(&[1.0, 2.0], &[2.0, 4.0])?;
/// assert!((same - 1.0).abs() < 1e-12);
///
/// let close = SimilarityMetric::Euclidean.compute(&[0.0, 0.0], &[3.0, 4.0])?;
/// assert!((close - 1.0 / 6.0).abs() < 1e-12);
///
/// assert!(SimilarityMetric::Jaccard.compute(&[], &[]).map(f64::is_nan)?);
/// # Ok::<(), nndescent_core::SimilarityError>(())
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SimilarityMetric {
    /// Cosine similarity mapped from `[-1, 1]` onto `[0, 1]`.
    #[default]
    Cosine,
    /// `1 / (1 + d)` for the Euclidean distance `d`.
    Euclidean,
    /// Pearson correlation mapped from `[-1, 1]` onto `[0, 1]`.
    Pearson,
    /// Jaccard index of the two vectors interpreted as value sets.
    Jaccard,
    /// Overlap coefficient of the two vectors interpreted as value sets.
    Overlap,
}

impl SimilarityMetric {
    /// Returns the lowercase name used on the command line and in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
            Self::Pearson => "pearson",
            Self::Jaccard => "jaccard",
            Self::Overlap => "overlap",
        }
    }

    /// Whether the metric compares vectors position by position, requiring
    /// both sides to share a dimension.
    #[must_use]
    pub const fn is_positional(self) -> bool {
        matches!(self, Self::Cosine | Self::Euclidean | Self::Pearson)
    }

    /// Computes the similarity of `left` and `right`.
    ///
    /// # Errors
    /// Returns [`SimilarityError::DimensionMismatch`] when a positional metric
    /// receives vectors of different lengths.
    pub fn compute(self, left: &[f64], right: &[f64]) -> Result<f64, SimilarityError> {
        if left.is_empty() || right.is_empty() {
            return Ok(f64::NAN);
        }
        if self.is_positional() && left.len() != right.len() {
            return Err(SimilarityError::DimensionMismatch {
                left: left.len(),
                right: right.len(),
            });
        }
        let value = match self {
            Self::Cosine => cosine(left, right),
            Self::Euclidean => euclidean(left, right),
            Self::Pearson => pearson(left, right),
            Self::Jaccard => {
                let (shared, left_len, right_len) = set_overlap(left, right);
                let union = left_len + right_len - shared;
                shared as f64 / union as f64
            }
            Self::Overlap => {
                let (shared, left_len, right_len) = set_overlap(left, right);
                shared as f64 / left_len.min(right_len) as f64
            }
        };
        Ok(value)
    }
}

fn cosine(left: &[f64], right: &[f64]) -> f64 {
    let mut dot = 0.0f64;
    let mut left_squares = 0.0f64;
    let mut right_squares = 0.0f64;
    for (&l, &r) in left.iter().zip(right) {
        dot += l * r;
        left_squares += l * l;
        right_squares += r * r;
    }
    let denominator = left_squares.sqrt() * right_squares.sqrt();
    if denominator == 0.0 {
        return f64::NAN;
    }
    // Theoretical range is [-1, 1], but numerical noise can spill over.
    let similarity = (dot / denominator).clamp(-1.0, 1.0);
    (1.0 + similarity) / 2.0
}

fn euclidean(left: &[f64], right: &[f64]) -> f64 {
    let squared: f64 = left
        .iter()
        .zip(right)
        .map(|(&l, &r)| (l - r) * (l - r))
        .sum();
    1.0 / (1.0 + squared.sqrt())
}

fn pearson(left: &[f64], right: &[f64]) -> f64 {
    let len = left.len() as f64;
    let left_mean = left.iter().sum::<f64>() / len;
    let right_mean = right.iter().sum::<f64>() / len;
    let centred_left: Vec<f64> = left.iter().map(|value| value - left_mean).collect();
    let centred_right: Vec<f64> = right.iter().map(|value| value - right_mean).collect();
    cosine(&centred_left, &centred_right)
}

/// Returns `(shared, |left|, |right|)` over the distinct values of each side.
fn set_overlap(left: &[f64], right: &[f64]) -> (usize, usize, usize) {
    let left = distinct_sorted(left);
    let right = distinct_sorted(right);
    let mut shared = 0;
    let (mut i, mut j) = (0, 0);
    while let (Some(l), Some(r)) = (left.get(i), right.get(j)) {
        match l.total_cmp(r) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                shared += 1;
                i += 1;
                j += 1;
            }
        }
    }
    (shared, left.len(), right.len())
}

fn distinct_sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_unstable_by(f64::total_cmp);
    sorted.dedup_by(|a, b| a.total_cmp(b) == Ordering::Equal);
    sorted
}
