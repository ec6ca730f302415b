//! Shared state handed to every parallel pipeline stage.

use rand::{Rng, rngs::SmallRng};
use rayon::{ThreadPool, prelude::*};

use crate::{
    convergence::IterationState,
    error::{KnnError, Result},
    filter::{self, NodeFilter},
    neighbour_list::NeighbourLists,
    partition::Partition,
    progress::ProgressTracker,
    rng::{SeedSequence, Stage},
    sampler::{AdjacencySource, SamplerKind},
    similarity::SimilarityFunction,
};

/// Borrowed view over one computation, shared by all workers.
pub(crate) struct StageContext<'a> {
    pub(crate) pool: &'a ThreadPool,
    pub(crate) similarity: &'a dyn SimilarityFunction,
    pub(crate) lists: &'a NeighbourLists,
    pub(crate) partitions: &'a [Partition],
    pub(crate) progress: &'a dyn ProgressTracker,
    pub(crate) adjacency: Option<&'a dyn AdjacencySource>,
    pub(crate) target_filter: Option<&'a dyn NodeFilter>,
    pub(crate) state: &'a IterationState,
    pub(crate) seeds: SeedSequence,
    pub(crate) sampler: SamplerKind,
    pub(crate) node_count: usize,
    pub(crate) bounded_k: usize,
    pub(crate) sampled_k: usize,
    pub(crate) perturbation_rate: f64,
    pub(crate) random_joins: usize,
}

impl StageContext<'_> {
    /// Evaluates the similarity of `a` towards `b`.
    ///
    /// `NaN` passes through; infinities and function errors are fatal.
    pub(crate) fn evaluate(&self, a: usize, b: usize) -> Result<f64> {
        let value = self
            .similarity
            .similarity(a, b)
            .map_err(|error| KnnError::Similarity {
                similarity: self.similarity.name().to_owned(),
                left: a,
                right: b,
                error,
            })?;
        if value.is_infinite() {
            return Err(KnnError::NonFiniteSimilarity {
                similarity: self.similarity.name().to_owned(),
                left: a,
                right: b,
            });
        }
        Ok(value)
    }

    /// Whether `node` may be kept as anyone's neighbour.
    pub(crate) fn accepts_target(&self, node: usize) -> bool {
        filter::admits(self.target_filter, node)
    }

    /// Offers `candidate` to `node`'s list unless the target filter rejects
    /// it. Returns whether the list changed.
    pub(crate) fn offer<R: Rng + ?Sized>(
        &self,
        node: usize,
        candidate: usize,
        similarity: f64,
        rng: &mut R,
    ) -> Result<bool> {
        if !self.accepts_target(candidate) {
            return Ok(false);
        }
        self.lists
            .insert(node, candidate, similarity, rng, self.perturbation_rate)
    }

    pub(crate) fn check_cancelled(&self, stage: Stage) -> Result<()> {
        if self.progress.is_cancelled() {
            return Err(KnnError::Cancelled {
                stage: stage.as_str(),
            });
        }
        Ok(())
    }

    pub(crate) fn rng(&self, stage: Stage, iteration: u32, partition: &Partition) -> SmallRng {
        self.seeds.rng(stage, iteration, partition.index())
    }

    /// Runs `work` over every partition on the worker pool and returns the
    /// outputs in partition order. Returns once every partition finished; the
    /// first error stops the remaining partitions.
    pub(crate) fn map_partitions<T, F>(&self, stage: Stage, work: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(&Partition) -> Result<T> + Sync,
    {
        self.pool.install(|| {
            self.partitions
                .par_iter()
                .map(|partition| {
                    self.check_cancelled(stage)?;
                    let output = work(partition)?;
                    self.progress.log_progress(partition.len() as u64);
                    Ok(output)
                })
                .collect()
        })
    }
}
