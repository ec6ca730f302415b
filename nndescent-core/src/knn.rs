//! NN-descent orchestration.
//!
//! Provides the [`Knn`] entry point, which seeds the neighbour lists and then
//! runs split, reverse-index and join stages until the convergence tracker
//! reports a terminal state.

use std::fmt;

use rayon::{ThreadPoolBuilder, prelude::*};
use tracing::{debug, info, info_span, instrument};

use crate::{
    Result,
    config::KnnConfig,
    convergence::{ConvergenceState, ConvergenceTracker, IterationCounts, IterationState},
    error::KnnError,
    filter::{self, NodeFilter},
    join,
    neighbour_list::NeighbourLists,
    partition::Partition,
    progress::{NoopProgress, ProgressTracker},
    result::{KnnResult, RunStats},
    reverse,
    rng::SeedSequence,
    sampler::{self, AdjacencySource},
    similarity::SimilarityFunction,
    split,
    stage::StageContext,
};

/// Optional collaborators for a computation.
///
/// Source and target filters restrict the reported graph: only nodes passing
/// the source filter report neighbours, and only nodes passing the target
/// filter are kept as neighbours.
///
/// # Examples
/// ```
/// use nndescent_core::{CancellationToken, KnnContext};
///
/// let adjacency = vec![vec![1], vec![0]];
/// let token = CancellationToken::new();
/// let context = KnnContext::new()
///     .with_adjacency(&adjacency)
///     .with_progress(&token);
/// assert!(context.adjacency().is_some());
///
/// let even = |node: usize| node % 2 == 0;
/// let filtered = context.with_target_filter(&even);
/// assert!(filtered.target_filter().is_some());
/// ```
#[derive(Clone, Copy)]
pub struct KnnContext<'a> {
    adjacency: Option<&'a dyn AdjacencySource>,
    progress: &'a dyn ProgressTracker,
    source_filter: Option<&'a dyn NodeFilter>,
    target_filter: Option<&'a dyn NodeFilter>,
}

impl Default for KnnContext<'_> {
    fn default() -> Self {
        Self {
            adjacency: None,
            progress: &NoopProgress,
            source_filter: None,
            target_filter: None,
        }
    }
}

impl fmt::Debug for KnnContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KnnContext")
            .field("adjacency", &self.adjacency.is_some())
            .field("source_filter", &self.source_filter.is_some())
            .field("target_filter", &self.target_filter.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a> KnnContext<'a> {
    /// Creates a context without adjacency that never cancels.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Supplies the adjacency walked by [`crate::SamplerKind::RandomWalk`].
    #[must_use]
    pub fn with_adjacency(mut self, adjacency: &'a dyn AdjacencySource) -> Self {
        self.adjacency = Some(adjacency);
        self
    }

    /// Supplies the progress sink and cancellation source.
    #[must_use]
    pub fn with_progress(mut self, progress: &'a dyn ProgressTracker) -> Self {
        self.progress = progress;
        self
    }

    /// Restricts the result to source nodes accepted by `filter`.
    #[must_use]
    pub fn with_source_filter(mut self, filter: &'a dyn NodeFilter) -> Self {
        self.source_filter = Some(filter);
        self
    }

    /// Restricts neighbours to target nodes accepted by `filter`.
    #[must_use]
    pub fn with_target_filter(mut self, filter: &'a dyn NodeFilter) -> Self {
        self.target_filter = Some(filter);
        self
    }

    /// Returns the configured adjacency, if any.
    #[must_use]
    pub fn adjacency(&self) -> Option<&'a dyn AdjacencySource> {
        self.adjacency
    }

    /// Returns the source filter, if any.
    #[must_use]
    pub fn source_filter(&self) -> Option<&'a dyn NodeFilter> {
        self.source_filter
    }

    /// Returns the target filter, if any.
    #[must_use]
    pub fn target_filter(&self) -> Option<&'a dyn NodeFilter> {
        self.target_filter
    }
}

/// Entry point for building approximate KNN graphs.
///
/// # Examples
/// ```
/// use nndescent_core::{Knn, KnnConfig, ScalarSimilarity};
///
/// let config = KnnConfig::builder()
///     .with_top_k(2)
///     .with_random_seed(1)
///     .with_concurrency(1)
///     .build()?;
/// let values: Vec<f64> = (0..20).map(f64::from).collect();
/// let similarity = ScalarSimilarity::new("position", values);
/// let result = Knn::new(config).compute(20, &similarity)?;
///
/// assert_eq!(result.node_count(), 20);
/// assert!(result.ran_iterations() >= 1);
/// for node in 0..20 {
///     assert!(result.neighbours_of(node).all(|other| other != node));
/// }
/// # Ok::<(), nndescent_core::KnnError>(())
/// ```
#[derive(Clone, Debug)]
pub struct Knn {
    config: KnnConfig,
}

impl Knn {
    /// Wraps a validated configuration.
    #[must_use]
    pub fn new(config: KnnConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration used by this instance.
    #[must_use]
    pub fn config(&self) -> &KnnConfig {
        &self.config
    }

    /// Builds the KNN graph of `node_count` nodes under `similarity`.
    ///
    /// # Errors
    /// Returns [`KnnError::InsufficientNodes`] for fewer than two nodes, any
    /// failure reported by `similarity`, and [`KnnError::ThreadPool`] when the
    /// worker pool cannot start.
    pub fn compute<S: SimilarityFunction>(
        &self,
        node_count: usize,
        similarity: &S,
    ) -> Result<KnnResult> {
        self.compute_with(node_count, similarity, KnnContext::default())
    }

    /// Builds the KNN graph with explicit collaborators.
    ///
    /// Cancellation observed through the context's progress tracker yields
    /// [`KnnError::Cancelled`]; no partial result is returned.
    ///
    /// # Errors
    /// Returns the same errors as [`Knn::compute`] plus
    /// [`KnnError::Cancelled`].
    #[instrument(
        name = "knn.compute",
        err,
        skip(self, similarity, context),
        fields(
            node_count = node_count,
            similarity = %similarity.name(),
            top_k = self.config.top_k(),
            concurrency = self.config.concurrency(),
            sampler = self.config.initial_sampler().as_str(),
        ),
    )]
    pub fn compute_with<S: SimilarityFunction>(
        &self,
        node_count: usize,
        similarity: &S,
        context: KnnContext<'_>,
    ) -> Result<KnnResult> {
        if node_count < 2 {
            return Err(KnnError::InsufficientNodes { node_count });
        }
        let config = &self.config;
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.concurrency())
            .thread_name(|index| format!("nndescent-worker-{index}"))
            .build()
            .map_err(|error| KnnError::ThreadPool {
                message: error.to_string(),
            })?;
        let partitions =
            Partition::range(node_count, config.concurrency(), config.min_batch_size())?;
        let seeds = SeedSequence::from_config(config.random_seed());
        let lists = NeighbourLists::new(node_count, config.bounded_k(node_count));
        let state = IterationState::default();
        let ctx = StageContext {
            pool: &pool,
            similarity,
            lists: &lists,
            partitions: &partitions,
            progress: context.progress,
            adjacency: context.adjacency,
            target_filter: context.target_filter,
            state: &state,
            seeds,
            sampler: config.initial_sampler(),
            node_count,
            bounded_k: config.bounded_k(node_count),
            sampled_k: config.sampled_k(node_count),
            perturbation_rate: config.perturbation_rate(),
            random_joins: config.random_joins(),
        };
        debug!(
            partitions = partitions.len(),
            bounded_k = ctx.bounded_k,
            sampled_k = ctx.sampled_k,
            seed = seeds.base(),
            "initialising neighbour lists",
        );

        sampler::initialise(&ctx)?;
        let sampled = state.drain();
        record_metrics(sampled, None);
        let mut node_pairs_considered = sampled.node_pairs_considered();

        let mut tracker = ConvergenceTracker::new(config.delta_threshold(), config.max_iterations());
        loop {
            let iteration = tracker.iterations() + 1;
            let span = info_span!("knn.iteration", iteration);
            let _entered = span.enter();

            let sets = split::split(&ctx, iteration)?;
            let reverse = reverse::build(&ctx, &sets)?;
            join::join(&ctx, &sets, &reverse, iteration)?;

            let counts = state.drain();
            node_pairs_considered += counts.node_pairs_considered();
            let status = tracker.observe(counts.updates, counts.comparisons);
            record_metrics(counts, Some(tracker.last_delta()));
            info!(
                iteration,
                updates = counts.updates,
                comparisons = counts.comparisons,
                delta = tracker.last_delta(),
                "iteration completed",
            );
            if status.is_terminal() {
                break;
            }
        }

        let mut lists = lists.into_lists()?;
        let nodes_compared = lists.iter().filter(|list| !list.is_empty()).count();
        let cutoff = config.similarity_cutoff();
        let sources = context.source_filter;
        if cutoff > 0.0 || sources.is_some() {
            pool.install(|| {
                lists.par_iter_mut().for_each(|list| {
                    if !filter::admits(sources, list.owner()) {
                        list.clear();
                    } else if cutoff > 0.0 {
                        list.retain_at_least(cutoff);
                    }
                });
            });
        }

        let result = KnnResult::from_lists(
            lists,
            RunStats {
                ran_iterations: tracker.iterations(),
                did_converge: tracker.state() == ConvergenceState::Converged,
                node_pairs_considered,
                nodes_compared,
            },
        );
        info!(
            iterations = result.ran_iterations(),
            converged = result.did_converge(),
            node_pairs_considered,
            size = result.size(),
            "knn computation completed",
        );
        Ok(result)
    }
}

#[cfg(feature = "metrics")]
fn record_metrics(counts: IterationCounts, delta: Option<f64>) {
    metrics::counter!("knn_node_pairs_considered").increment(counts.node_pairs_considered());
    metrics::counter!("knn_updates").increment(counts.updates);
    if let Some(delta) = delta {
        metrics::histogram!("knn_iteration_delta").record(delta);
    }
}

#[cfg(not(feature = "metrics"))]
fn record_metrics(_counts: IterationCounts, _delta: Option<f64>) {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CancellationToken, KnnConfigBuilder, test_utils::CountingSimilarity};
    use rstest::rstest;

    fn knn(top_k: usize) -> Knn {
        KnnConfigBuilder::new()
            .with_top_k(top_k)
            .with_random_seed(99)
            .with_concurrency(2)
            .with_min_batch_size(1)
            .build_knn()
            .expect("config must validate")
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    fn rejects_tiny_populations_before_evaluating(#[case] node_count: usize) {
        let similarity = CountingSimilarity::new(vec![0.0; 4]);
        let err = knn(1)
            .compute(node_count, &similarity)
            .expect_err("too few nodes");
        assert_eq!(err, KnnError::InsufficientNodes { node_count });
        assert_eq!(similarity.calls(), 0);
    }

    #[test]
    fn node_pairs_include_initial_sampling() {
        let similarity = CountingSimilarity::new((0..30).map(f64::from).collect());
        let result = knn(3).compute(30, &similarity).expect("compute succeeds");
        assert_eq!(result.node_pairs_considered(), similarity.calls() as u64);
        assert!(result.node_pairs_considered() >= 90);
        assert_eq!(result.nodes_compared(), 30);
    }

    #[test]
    fn filters_restrict_sources_and_targets() {
        let similarity = CountingSimilarity::new((0..40).map(f64::from).collect());
        let sources = |node: usize| node < 10;
        let targets = |node: usize| node % 2 == 1;
        let context = KnnContext::new()
            .with_source_filter(&sources)
            .with_target_filter(&targets);
        let result = knn(3)
            .compute_with(40, &similarity, context)
            .expect("compute succeeds");

        for node in 0..40 {
            let ids: Vec<_> = result.neighbours_of(node).collect();
            if node >= 10 {
                assert!(ids.is_empty(), "node {node} is not a source: {ids:?}");
            } else {
                assert!(!ids.is_empty());
                assert!(ids.iter().all(|&id| id % 2 == 1), "node {node}: {ids:?}");
            }
        }
        assert!(result.similarity_results().all(|pair| pair.source < 10));
        assert_eq!(result.size(), 10);
    }

    #[test]
    fn cancelled_before_start_evaluates_nothing() {
        let similarity = CountingSimilarity::new((0..10).map(f64::from).collect());
        let token = CancellationToken::new();
        token.cancel();
        let err = knn(2)
            .compute_with(10, &similarity, KnnContext::new().with_progress(&token))
            .expect_err("cancelled");
        assert_eq!(err, KnnError::Cancelled { stage: "sample" });
        assert!(err.is_cancellation());
        assert_eq!(similarity.calls(), 0);
    }
}
