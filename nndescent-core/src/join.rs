//! Local join: the refinement step of NN-descent.
//!
//! For every node `u` the sampled forward sets are widened with a sample of
//! the reverse sets. Every pair with at least one new side is compared and
//! offered to both endpoints; old-old pairs were already compared in an
//! earlier iteration and are skipped.

use rand::Rng;

use crate::{
    Result,
    convergence::IterationCounts,
    reverse::ReverseNeighbours,
    rng::Stage,
    split::SplitSets,
    stage::StageContext,
};

/// Runs the local join for every node of `iteration`.
pub(crate) fn join(
    ctx: &StageContext<'_>,
    sets: &SplitSets,
    reverse: &ReverseNeighbours,
    iteration: u32,
) -> Result<()> {
    let symmetric = ctx.similarity.is_symmetric();
    ctx.map_partitions(Stage::Join, |partition| {
        let mut joiner = Joiner {
            ctx,
            symmetric,
            rng: ctx.rng(Stage::Join, iteration, partition),
            counts: IterationCounts::default(),
        };
        for node in partition.nodes() {
            ctx.check_cancelled(Stage::Join)?;
            joiner.join_node(node, sets, reverse)?;
            joiner.random_joins(node)?;
        }
        let counts = joiner.counts;
        ctx.state
            .record(counts.updates, counts.comparisons, counts.random_comparisons);
        Ok(())
    })?;
    Ok(())
}

struct Joiner<'c, 'a, R> {
    ctx: &'c StageContext<'a>,
    symmetric: bool,
    rng: R,
    counts: IterationCounts,
}

impl<R: Rng> Joiner<'_, '_, R> {
    fn join_node(&mut self, node: usize, sets: &SplitSets, reverse: &ReverseNeighbours) -> Result<()> {
        let sampled_k = self.ctx.sampled_k;
        let mut new_pool = sets.new_of(node).to_vec();
        extend_sampled(&mut new_pool, reverse.new_of(node), sampled_k, &mut self.rng);
        normalise(&mut new_pool, node);
        if new_pool.is_empty() {
            return Ok(());
        }

        let mut old_pool = sets.old_of(node).to_vec();
        extend_sampled(&mut old_pool, reverse.old_of(node), sampled_k, &mut self.rng);
        normalise(&mut old_pool, node);
        old_pool.retain(|id| new_pool.binary_search(id).is_err());

        for (position, &left) in new_pool.iter().enumerate() {
            for &right in &new_pool[position + 1..] {
                self.join_pair(left, right)?;
            }
            for &right in &old_pool {
                self.join_pair(left, right)?;
            }
        }
        Ok(())
    }

    /// Compares `left` and `right` and offers the result to both lists.
    ///
    /// A pair counts as one update however many of its offers landed, so
    /// updates never outnumber comparisons. Directions whose target is
    /// filtered out are not evaluated.
    fn join_pair(&mut self, left: usize, right: usize) -> Result<()> {
        let to_left = self.ctx.accepts_target(right);
        let to_right = self.ctx.accepts_target(left);
        if !(to_left || to_right) {
            return Ok(());
        }

        let mut changed = false;
        let mut forward = None;
        if to_left || self.symmetric {
            let value = self.compare(left, right)?;
            if to_left {
                changed |= self.ctx.offer(left, right, value, &mut self.rng)?;
            }
            forward = Some(value);
        }
        if to_right {
            let backward = match forward {
                Some(value) if self.symmetric => value,
                _ => self.compare(right, left)?,
            };
            changed |= self.ctx.offer(right, left, backward, &mut self.rng)?;
        }
        self.counts.updates += u64::from(changed);
        Ok(())
    }

    fn compare(&mut self, a: usize, b: usize) -> Result<f64> {
        let value = self.ctx.evaluate(a, b)?;
        self.counts.comparisons += 1;
        Ok(value)
    }

    /// Compares `node` with uniformly drawn peers. These offers only touch
    /// `node`'s own list and never count as updates.
    fn random_joins(&mut self, node: usize) -> Result<()> {
        let others = self.ctx.node_count.saturating_sub(1);
        if others == 0 {
            return Ok(());
        }
        for _ in 0..self.ctx.random_joins {
            let offset = self.rng.gen_range(0..others);
            let peer = if offset >= node { offset + 1 } else { offset };
            if !self.ctx.accepts_target(peer) {
                continue;
            }
            let similarity = self.ctx.evaluate(node, peer)?;
            self.counts.random_comparisons += 1;
            self.ctx.offer(node, peer, similarity, &mut self.rng)?;
        }
        Ok(())
    }
}

/// Appends each reverse id with probability `sampled_k / reverse.len()`.
fn extend_sampled<R: Rng + ?Sized>(
    pool: &mut Vec<usize>,
    reverse: Option<&[usize]>,
    sampled_k: usize,
    rng: &mut R,
) {
    let Some(reverse) = reverse else {
        return;
    };
    let len = reverse.len();
    pool.extend(
        reverse
            .iter()
            .copied()
            .filter(|_| rng.gen_range(0..len) < sampled_k),
    );
}

fn normalise(pool: &mut Vec<usize>, node: usize) {
    pool.retain(|&id| id != node);
    pool.sort_unstable();
    pool.dedup();
}
