//! Result types for KNN graph construction.
//!
//! A [`KnnResult`] owns the final neighbour lists together with the run
//! statistics reported by the driver.

use crate::neighbour_list::BoundedNeighbourList;

/// A retained neighbour and its similarity to the owning node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbour {
    /// Identifier of the neighbouring node.
    pub id: usize,
    /// Similarity between the owner and the neighbour.
    pub similarity: f64,
}

/// One directed entry of the KNN graph.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimilarityResult {
    /// Node owning the neighbour list.
    pub source: usize,
    /// Neighbour retained in the source's list.
    pub target: usize,
    /// Similarity of `source` towards `target`.
    pub similarity: f64,
}

/// Statistics gathered while running the refinement loop.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct RunStats {
    pub(crate) ran_iterations: u32,
    pub(crate) did_converge: bool,
    pub(crate) node_pairs_considered: u64,
    pub(crate) nodes_compared: usize,
}

/// Represents the output of a [`crate::Knn::compute`] invocation.
///
/// Neighbour sequences are ordered by descending similarity with ties broken
/// by ascending id.
///
/// # Examples
/// ```
/// use nndescent_core::{KnnConfigBuilder, ScalarSimilarity};
///
/// let knn = KnnConfigBuilder::new()
///     .with_top_k(1)
///     .with_random_seed(7)
///     .with_random_joins(32)
///     .with_concurrency(1)
///     .build_knn()?;
/// let similarity = ScalarSimilarity::new("knn", vec![1.2, 1.1, 42.0]);
/// let result = knn.compute(3, &similarity)?;
///
/// assert_eq!(result.neighbours_of(0).collect::<Vec<_>>(), vec![1]);
/// assert_eq!(result.neighbours_of(2).collect::<Vec<_>>(), vec![0]);
/// assert_eq!(result.size(), 3);
/// assert_eq!(result.total_similarity_pairs(), 3);
/// # Ok::<(), nndescent_core::KnnError>(())
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct KnnResult {
    neighbours: Vec<Vec<Neighbour>>,
    stats: RunStats,
}

impl KnnResult {
    pub(crate) fn from_lists(lists: Vec<BoundedNeighbourList>, stats: RunStats) -> Self {
        let neighbours = lists
            .into_iter()
            .map(|list| {
                list.entries()
                    .iter()
                    .map(|entry| Neighbour {
                        id: entry.id(),
                        similarity: entry.similarity(),
                    })
                    .collect()
            })
            .collect();
        Self { neighbours, stats }
    }

    /// Number of nodes with at least one neighbour.
    #[must_use]
    pub fn size(&self) -> usize {
        self.neighbours.iter().filter(|list| !list.is_empty()).count()
    }

    /// Number of nodes in the computed population.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.neighbours.len()
    }

    /// Neighbour ids of `node` in rank order. Unknown nodes have none.
    ///
    /// The returned iterator borrows the result and may be recreated at will.
    pub fn neighbours_of(&self, node: usize) -> impl ExactSizeIterator<Item = usize> + '_ {
        self.neighbours_with_similarity(node)
            .iter()
            .map(|neighbour| neighbour.id)
    }

    /// Neighbours of `node` with their similarities, in rank order.
    #[must_use]
    pub fn neighbours_with_similarity(&self, node: usize) -> &[Neighbour] {
        self.neighbours.get(node).map_or(&[], Vec::as_slice)
    }

    /// Every retained directed entry, ordered by source and then rank.
    ///
    /// When `a` and `b` keep each other both directions are reported.
    pub fn similarity_results(&self) -> impl Iterator<Item = SimilarityResult> + '_ {
        self.neighbours
            .iter()
            .enumerate()
            .flat_map(|(source, neighbours)| {
                neighbours.iter().map(move |neighbour| SimilarityResult {
                    source,
                    target: neighbour.id,
                    similarity: neighbour.similarity,
                })
            })
    }

    /// Number of entries yielded by [`Self::similarity_results`].
    #[must_use]
    pub fn total_similarity_pairs(&self) -> usize {
        self.neighbours.iter().map(Vec::len).sum()
    }

    /// Number of refinement iterations that ran.
    #[must_use]
    #[rustfmt::skip]
    pub fn ran_iterations(&self) -> u32 { self.stats.ran_iterations }

    /// Whether the update ratio fell to the configured threshold.
    #[must_use]
    #[rustfmt::skip]
    pub fn did_converge(&self) -> bool { self.stats.did_converge }

    /// Similarity evaluations performed, including initial sampling and
    /// random joins.
    #[must_use]
    #[rustfmt::skip]
    pub fn node_pairs_considered(&self) -> u64 { self.stats.node_pairs_considered }

    /// Nodes that held at least one neighbour when refinement finished,
    /// before any similarity cutoff was applied.
    #[must_use]
    #[rustfmt::skip]
    pub fn nodes_compared(&self) -> usize { self.stats.nodes_compared }
}
