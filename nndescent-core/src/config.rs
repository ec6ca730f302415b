//! Validated NN-descent configuration.
//!
//! [`KnnConfigBuilder`] collects the tuning knobs and checks their ranges in
//! [`KnnConfigBuilder::build`]; a [`KnnConfig`] is therefore always valid.

use crate::{
    Result,
    error::KnnError,
    knn::Knn,
    sampler::SamplerKind,
};

const DEFAULT_TOP_K: usize = 10;
const DEFAULT_SAMPLE_RATE: f64 = 0.5;
const DEFAULT_DELTA_THRESHOLD: f64 = 0.001;
const DEFAULT_MAX_ITERATIONS: u32 = 100;
const DEFAULT_RANDOM_JOINS: usize = 10;
const DEFAULT_CONCURRENCY: usize = 4;
const DEFAULT_MIN_BATCH_SIZE: usize = 1_000;

/// Immutable, validated parameters for a [`Knn`] computation.
#[derive(Clone, Debug, PartialEq)]
pub struct KnnConfig {
    top_k: usize,
    sample_rate: f64,
    delta_threshold: f64,
    max_iterations: u32,
    random_seed: Option<u64>,
    perturbation_rate: f64,
    random_joins: usize,
    concurrency: usize,
    min_batch_size: usize,
    initial_sampler: SamplerKind,
    similarity_cutoff: f64,
}

impl KnnConfig {
    /// Returns a builder populated with defaults.
    #[must_use]
    pub fn builder() -> KnnConfigBuilder {
        KnnConfigBuilder::default()
    }

    /// Target number of neighbours per node.
    #[must_use]
    #[rustfmt::skip]
    pub fn top_k(&self) -> usize { self.top_k }

    /// Fraction of `top_k` sampled into each old/new set per iteration.
    #[must_use]
    #[rustfmt::skip]
    pub fn sample_rate(&self) -> f64 { self.sample_rate }

    /// Update ratio at or below which the computation converges.
    #[must_use]
    #[rustfmt::skip]
    pub fn delta_threshold(&self) -> f64 { self.delta_threshold }

    /// Upper bound on refinement iterations.
    #[must_use]
    #[rustfmt::skip]
    pub fn max_iterations(&self) -> u32 { self.max_iterations }

    /// Base seed, or `None` to seed from OS entropy.
    #[must_use]
    #[rustfmt::skip]
    pub fn random_seed(&self) -> Option<u64> { self.random_seed }

    /// Probability of evicting the worst neighbour for a non-improving
    /// candidate.
    #[must_use]
    #[rustfmt::skip]
    pub fn perturbation_rate(&self) -> f64 { self.perturbation_rate }

    /// Random comparisons per node per iteration.
    #[must_use]
    #[rustfmt::skip]
    pub fn random_joins(&self) -> usize { self.random_joins }

    /// Number of worker threads.
    #[must_use]
    #[rustfmt::skip]
    pub fn concurrency(&self) -> usize { self.concurrency }

    /// Smallest partition worth handing to a separate worker.
    #[must_use]
    #[rustfmt::skip]
    pub fn min_batch_size(&self) -> usize { self.min_batch_size }

    /// Policy used to seed the neighbour lists.
    #[must_use]
    #[rustfmt::skip]
    pub fn initial_sampler(&self) -> SamplerKind { self.initial_sampler }

    /// Minimum similarity kept in the final result; `0` keeps everything.
    #[must_use]
    #[rustfmt::skip]
    pub fn similarity_cutoff(&self) -> f64 { self.similarity_cutoff }

    /// Neighbour list capacity for a population of `node_count` nodes.
    ///
    /// # Examples
    /// ```
    /// use nndescent_core::KnnConfig;
    ///
    /// let config = KnnConfig::builder().with_top_k(10).build()?;
    /// assert_eq!(config.bounded_k(4), 3);
    /// assert_eq!(config.bounded_k(100), 10);
    /// # Ok::<(), nndescent_core::KnnError>(())
    /// ```
    #[must_use]
    pub fn bounded_k(&self, node_count: usize) -> usize {
        self.top_k.min(node_count.saturating_sub(1))
    }

    /// Size of each sampled old/new set for a population of `node_count`.
    ///
    /// # Examples
    /// ```
    /// use nndescent_core::KnnConfig;
    ///
    /// let config = KnnConfig::builder().with_top_k(10).with_sample_rate(0.25).build()?;
    /// assert_eq!(config.sampled_k(100), 3);
    /// assert_eq!(config.sampled_k(3), 2);
    /// # Ok::<(), nndescent_core::KnnError>(())
    /// ```
    #[must_use]
    pub fn sampled_k(&self, node_count: usize) -> usize {
        let sampled = (self.sample_rate * self.top_k as f64).ceil() as usize;
        self.bounded_k(node_count).min(sampled.max(1))
    }
}

impl Default for KnnConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            sample_rate: DEFAULT_SAMPLE_RATE,
            delta_threshold: DEFAULT_DELTA_THRESHOLD,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            random_seed: None,
            perturbation_rate: 0.0,
            random_joins: DEFAULT_RANDOM_JOINS,
            concurrency: DEFAULT_CONCURRENCY,
            min_batch_size: DEFAULT_MIN_BATCH_SIZE,
            initial_sampler: SamplerKind::Uniform,
            similarity_cutoff: 0.0,
        }
    }
}

/// Configures and constructs [`Knn`] instances.
///
/// # Examples
/// ```
/// use nndescent_core::{KnnConfigBuilder, SamplerKind};
///
/// let knn = KnnConfigBuilder::new()
///     .with_top_k(5)
///     .with_random_seed(42)
///     .with_concurrency(1)
///     .with_initial_sampler(SamplerKind::RandomWalk)
///     .build_knn()?;
/// assert_eq!(knn.config().top_k(), 5);
/// assert_eq!(knn.config().random_seed(), Some(42));
/// # Ok::<(), nndescent_core::KnnError>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct KnnConfigBuilder {
    config: KnnConfig,
}

impl KnnConfigBuilder {
    /// Creates a builder populated with default parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the target neighbour count.
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.config.top_k = top_k;
        self
    }

    /// Overrides the sampling rate.
    #[must_use]
    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.config.sample_rate = sample_rate;
        self
    }

    /// Overrides the convergence threshold. Zero disables convergence.
    #[must_use]
    pub fn with_delta_threshold(mut self, delta_threshold: f64) -> Self {
        self.config.delta_threshold = delta_threshold;
        self
    }

    /// Overrides the iteration cap.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Fixes the base seed so runs with equal concurrency are reproducible.
    #[must_use]
    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = Some(seed);
        self
    }

    /// Overrides the forced-eviction probability.
    #[must_use]
    pub fn with_perturbation_rate(mut self, perturbation_rate: f64) -> Self {
        self.config.perturbation_rate = perturbation_rate;
        self
    }

    /// Overrides the number of random comparisons per node and iteration.
    #[must_use]
    pub fn with_random_joins(mut self, random_joins: usize) -> Self {
        self.config.random_joins = random_joins;
        self
    }

    /// Overrides the worker thread count.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Overrides the smallest partition size.
    #[must_use]
    pub fn with_min_batch_size(mut self, min_batch_size: usize) -> Self {
        self.config.min_batch_size = min_batch_size;
        self
    }

    /// Selects the initial sampling policy.
    #[must_use]
    pub fn with_initial_sampler(mut self, sampler: SamplerKind) -> Self {
        self.config.initial_sampler = sampler;
        self
    }

    /// Drops result pairs whose similarity is below `cutoff`.
    #[must_use]
    pub fn with_similarity_cutoff(mut self, cutoff: f64) -> Self {
        self.config.similarity_cutoff = cutoff;
        self
    }

    /// Validates the parameters.
    ///
    /// # Errors
    /// Returns [`KnnError::InvalidConfig`] naming the first field outside its
    /// accepted range.
    pub fn build(self) -> Result<KnnConfig> {
        let config = self.config;
        if config.top_k == 0 {
            return Err(KnnError::invalid_config("top_k", "must be at least 1"));
        }
        if !(config.sample_rate > 0.0 && config.sample_rate <= 1.0) {
            return Err(KnnError::invalid_config(
                "sample_rate",
                format!("must be in (0, 1] (got {})", config.sample_rate),
            ));
        }
        check_unit_interval("delta_threshold", config.delta_threshold)?;
        if config.max_iterations == 0 {
            return Err(KnnError::invalid_config(
                "max_iterations",
                "must be at least 1",
            ));
        }
        check_unit_interval("perturbation_rate", config.perturbation_rate)?;
        if config.concurrency == 0 {
            return Err(KnnError::invalid_config("concurrency", "must be at least 1"));
        }
        if config.min_batch_size == 0 {
            return Err(KnnError::invalid_config(
                "min_batch_size",
                "must be at least 1",
            ));
        }
        check_unit_interval("similarity_cutoff", config.similarity_cutoff)?;
        Ok(config)
    }

    /// Validates the parameters and constructs a [`Knn`] instance.
    ///
    /// # Errors
    /// Returns the same errors as [`KnnConfigBuilder::build`].
    pub fn build_knn(self) -> Result<Knn> {
        self.build().map(Knn::new)
    }
}

fn check_unit_interval(field: &'static str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(KnnError::invalid_config(
            field,
            format!("must be in [0, 1] (got {value})"),
        ))
    }
}
