//! Recall measurement against an exhaustive oracle.
//!
//! Recall is kept as integer hits over a target count; convert to a fraction
//! only when reporting.

use std::collections::HashSet;

use nndescent_core::{KnnResult, SimilarityError, SimilarityFunction};

/// Integer recall score.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RecallScore {
    /// True neighbours present in the approximate lists.
    pub hits: usize,
    /// Number of true neighbours looked for.
    pub total: usize,
}

impl RecallScore {
    /// Adds another node's score.
    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self {
            hits: self.hits + other.hits,
            total: self.total + other.total,
        }
    }
}

/// Exact top-`k` neighbours of `query` by exhaustive scan, most similar
/// first with ties broken by ascending id. `NaN` comparisons are skipped.
///
/// # Errors
/// Returns [`SimilarityError`] if any evaluation fails.
pub fn exact_top_k<S: SimilarityFunction>(
    similarity: &S,
    node_count: usize,
    query: usize,
    k: usize,
) -> Result<Vec<usize>, SimilarityError> {
    let mut scored = Vec::with_capacity(node_count.saturating_sub(1));
    for candidate in (0..node_count).filter(|&candidate| candidate != query) {
        let value = similarity.similarity(query, candidate)?;
        if !value.is_nan() {
            scored.push((candidate, value));
        }
    }
    scored.sort_by(|left, right| right.1.total_cmp(&left.1).then(left.0.cmp(&right.0)));
    Ok(scored.into_iter().take(k).map(|(id, _)| id).collect())
}

/// Scores `result` against the exact graph under `similarity`.
///
/// # Errors
/// Returns [`SimilarityError`] if the oracle cannot evaluate a pair.
///
/// # Examples
/// ```
/// use nndescent_benches::recall::graph_recall;
/// use nndescent_core::{KnnConfigBuilder, ScalarSimilarity};
///
/// let similarity = ScalarSimilarity::new("value", vec![0.0, 1.0, 5.0]);
/// let knn = KnnConfigBuilder::new().with_top_k(2).build_knn()?;
/// let result = knn.compute(3, &similarity)?;
/// let score = graph_recall(&result, &similarity, 2)?;
/// assert_eq!(score.hits, score.total);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn graph_recall<S: SimilarityFunction>(
    result: &KnnResult,
    similarity: &S,
    k: usize,
) -> Result<RecallScore, SimilarityError> {
    let node_count = result.node_count();
    (0..node_count).try_fold(RecallScore::default(), |score, node| {
        let exact = exact_top_k(similarity, node_count, node, k)?;
        let found: HashSet<usize> = result.neighbours_of(node).collect();
        Ok(score.merge(RecallScore {
            hits: exact.iter().filter(|id| found.contains(id)).count(),
            total: exact.len(),
        }))
    })
}
