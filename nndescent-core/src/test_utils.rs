//! Shared test utilities for `nndescent-core`.

use nndescent_test_support::ci::property_test_profile::ProptestRunProfile;
use proptest::test_runner::Config as ProptestConfig;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::{
    convergence::IterationState,
    error::SimilarityError,
    filter::NodeFilter,
    neighbour_list::NeighbourLists,
    partition::Partition,
    progress::CancellationToken,
    rng::SeedSequence,
    sampler::SamplerKind,
    similarity::SimilarityFunction,
    split::SplitSets,
    stage::StageContext,
};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

/// Builds a standard proptest configuration from the shared CI profile.
///
/// This keeps property suites aligned on the same `PROGTEST_CASES` and
/// `NNDESCENT_PBT_FORK` interpretation.
#[must_use]
pub(crate) fn suite_proptest_config(default_cases: u32) -> ProptestConfig {
    let profile = ProptestRunProfile::load(default_cases, false);
    ProptestConfig {
        cases: profile.cases(),
        fork: profile.fork(),
        ..ProptestConfig::default()
    }
}

/// Scalar similarity that records every evaluation.
#[derive(Clone)]
pub(crate) struct CountingSimilarity {
    values: Vec<f64>,
    calls: Arc<AtomicUsize>,
    symmetric: bool,
}

impl CountingSimilarity {
    #[must_use]
    pub(crate) fn new(values: Vec<f64>) -> Self {
        Self {
            values,
            calls: Arc::new(AtomicUsize::new(0)),
            symmetric: true,
        }
    }

    /// Reports the function as asymmetric while computing the same values.
    #[must_use]
    pub(crate) fn asymmetric(mut self) -> Self {
        self.symmetric = false;
        self
    }

    #[must_use]
    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl SimilarityFunction for CountingSimilarity {
    fn name(&self) -> &str {
        "counting"
    }

    fn similarity(&self, a: usize, b: usize) -> Result<f64, SimilarityError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let left = self
            .values
            .get(a)
            .ok_or(SimilarityError::OutOfBounds { index: a })?;
        let right = self
            .values
            .get(b)
            .ok_or(SimilarityError::OutOfBounds { index: b })?;
        Ok(1.0 / (1.0 + (left - right).abs()))
    }

    fn is_symmetric(&self) -> bool {
        self.symmetric
    }
}

/// Owns everything a [`StageContext`] borrows so single stages can be driven
/// in isolation.
pub(crate) struct StageHarness {
    pool: ThreadPool,
    lists: NeighbourLists,
    partitions: Vec<Partition>,
    state: IterationState,
    similarity: CountingSimilarity,
    token: CancellationToken,
    node_count: usize,
    k: usize,
    random_joins: usize,
    target_filter: Option<fn(usize) -> bool>,
}

impl StageHarness {
    /// Nodes carry the scalar value of their id and are split across two
    /// partitions.
    pub(crate) fn new(node_count: usize, k: usize) -> Self {
        let values = (0..node_count).map(|value| value as f64).collect();
        Self::with_similarity(CountingSimilarity::new(values), k)
    }

    pub(crate) fn with_similarity(similarity: CountingSimilarity, k: usize) -> Self {
        let node_count = similarity.len();
        Self {
            pool: ThreadPoolBuilder::new()
                .num_threads(2)
                .build()
                .expect("test pool must build"),
            lists: NeighbourLists::new(node_count, k),
            partitions: Partition::range(node_count, 2, 1).expect("non-empty population"),
            state: IterationState::default(),
            similarity,
            token: CancellationToken::new(),
            node_count,
            k,
            random_joins: 0,
            target_filter: None,
        }
    }

    pub(crate) fn with_random_joins(mut self, random_joins: usize) -> Self {
        self.random_joins = random_joins;
        self
    }

    pub(crate) fn with_target_filter(mut self, filter: fn(usize) -> bool) -> Self {
        self.target_filter = Some(filter);
        self
    }

    pub(crate) fn similarity(&self) -> &CountingSimilarity {
        &self.similarity
    }

    pub(crate) fn state(&self) -> &IterationState {
        &self.state
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns each node's retained ids in rank order.
    pub(crate) fn neighbour_ids(&self) -> Vec<Vec<usize>> {
        (0..self.node_count)
            .map(|node| {
                self.lists
                    .lock(node)
                    .expect("list lock must not be poisoned")
                    .compact()
                    .collect()
            })
            .collect()
    }

    pub(crate) fn run<T>(&self, stage: impl FnOnce(&StageContext<'_>) -> T) -> T {
        let ctx = StageContext {
            pool: &self.pool,
            similarity: &self.similarity,
            lists: &self.lists,
            partitions: &self.partitions,
            progress: &self.token,
            adjacency: None,
            target_filter: self
                .target_filter
                .as_ref()
                .map(|filter| filter as &dyn NodeFilter),
            state: &self.state,
            seeds: SeedSequence::new(0xC0FFEE),
            sampler: SamplerKind::Uniform,
            node_count: self.node_count,
            bounded_k: self.k,
            sampled_k: self.k,
            perturbation_rate: 0.0,
            random_joins: self.random_joins,
        };
        stage(&ctx)
    }
}

/// Builds split sets from plain per-node lists; empty lists become `None`.
pub(crate) fn split_sets(old: Vec<Vec<usize>>, new: Vec<Vec<usize>>) -> SplitSets {
    let wrap = |lists: Vec<Vec<usize>>| {
        lists
            .into_iter()
            .map(|ids| (!ids.is_empty()).then_some(ids))
            .collect()
    };
    SplitSets {
        old: wrap(old),
        new: wrap(new),
    }
}
