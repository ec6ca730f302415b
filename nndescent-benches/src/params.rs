//! Benchmark parameter labels.

use std::fmt;

/// Parameters identifying one NN-descent benchmark case.
#[derive(Clone, Debug)]
pub struct KnnBenchParams {
    /// Number of nodes in the population.
    pub point_count: usize,
    /// Neighbours kept per node.
    pub top_k: usize,
    /// Worker threads.
    pub concurrency: usize,
}

impl fmt::Display for KnnBenchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n={},k={},threads={}",
            self.point_count, self.top_k, self.concurrency
        )
    }
}
