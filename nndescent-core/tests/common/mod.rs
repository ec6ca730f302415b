//! Similarity functions and trackers shared by the integration suites.

#![allow(dead_code, reason = "each suite uses a different subset of helpers")]

use std::sync::atomic::{AtomicU64, Ordering};

use nndescent_core::{Knn, KnnConfigBuilder, ProgressTracker, SimilarityError, SimilarityFunction};
use nndescent_test_support::ci::property_test_profile::ProptestRunProfile;
use proptest::test_runner::Config as ProptestConfig;

/// Proptest configuration honouring the shared CI overrides.
#[must_use]
pub fn proptest_config(default_cases: u32) -> ProptestConfig {
    let profile = ProptestRunProfile::load(default_cases, false);
    ProptestConfig {
        cases: profile.cases(),
        fork: profile.fork(),
        ..ProptestConfig::default()
    }
}

/// Builds a single-threaded, seeded engine so suites are reproducible.
#[must_use]
pub fn seeded(top_k: usize) -> KnnConfigBuilder {
    KnnConfigBuilder::new()
        .with_top_k(top_k)
        .with_random_seed(0x5EED)
        .with_concurrency(1)
}

#[must_use]
pub fn knn(top_k: usize) -> Knn {
    seeded(top_k).build_knn().expect("configuration must be valid")
}

/// Ranks peers by id: lower ids are always more similar.
///
/// `similarity(a, b) = 1 / (1 + a + b)`, which is symmetric and strictly
/// decreasing in `b` for a fixed `a`.
#[derive(Clone, Copy, Debug)]
pub struct RankById {
    pub node_count: usize,
}

impl SimilarityFunction for RankById {
    fn name(&self) -> &str {
        "rank-by-id"
    }

    fn similarity(&self, a: usize, b: usize) -> Result<f64, SimilarityError> {
        for index in [a, b] {
            if index >= self.node_count {
                return Err(SimilarityError::OutOfBounds { index });
            }
        }
        Ok(1.0 / (1.0 + a as f64 + b as f64))
    }
}

/// Fails every comparison that touches `broken`.
#[derive(Clone, Copy, Debug)]
pub struct Faulty {
    pub broken: usize,
}

impl SimilarityFunction for Faulty {
    fn name(&self) -> &str {
        "faulty"
    }

    fn similarity(&self, a: usize, b: usize) -> Result<f64, SimilarityError> {
        if a == self.broken || b == self.broken {
            return Err(SimilarityError::Failed {
                message: format!("node {} has no property", self.broken),
            });
        }
        Ok(0.5)
    }
}

/// Returns positive infinity for every pair.
#[derive(Clone, Copy, Debug)]
pub struct Unbounded;

impl SimilarityFunction for Unbounded {
    fn name(&self) -> &str {
        "unbounded"
    }

    fn similarity(&self, _a: usize, _b: usize) -> Result<f64, SimilarityError> {
        Ok(f64::INFINITY)
    }
}

/// Cancels once `budget` partitions have reported progress.
#[derive(Debug)]
pub struct CancelAfter {
    budget: u64,
    reports: AtomicU64,
}

impl CancelAfter {
    #[must_use]
    pub fn new(budget: u64) -> Self {
        Self {
            budget,
            reports: AtomicU64::new(0),
        }
    }
}

impl ProgressTracker for CancelAfter {
    fn log_progress(&self, _nodes: u64) {
        self.reports.fetch_add(1, Ordering::Relaxed);
    }

    fn is_cancelled(&self) -> bool {
        self.reports.load(Ordering::Relaxed) >= self.budget
    }
}
