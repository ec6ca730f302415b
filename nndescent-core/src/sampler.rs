//! Initial neighbour sampling.
//!
//! Before refinement starts every node receives up to `k` distinct random
//! candidates. [`SamplerKind::RandomWalk`] biases the draw towards nodes that
//! are reachable through an [`AdjacencySource`]; any shortfall is topped up
//! uniformly.

use rand::{Rng, seq::SliceRandom, seq::index};
use tracing::debug;

use crate::{Result, rng::Stage, stage::StageContext};

/// Walk steps budgeted per wanted candidate.
const WALK_STEPS_PER_CANDIDATE: usize = 4;
/// Probability of jumping back to the start node after each step.
const WALK_RESTART_PROBABILITY: f64 = 0.15;

/// Policy used to seed the neighbour lists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SamplerKind {
    /// Uniform sampling without replacement.
    #[default]
    Uniform,
    /// Restarting random walks over an [`AdjacencySource`], topped up
    /// uniformly. Without an adjacency source this behaves like `Uniform`.
    RandomWalk,
}

impl SamplerKind {
    /// Returns the lowercase name used on the command line and in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::RandomWalk => "random_walk",
        }
    }
}

/// Adjacency consulted by [`SamplerKind::RandomWalk`].
///
/// # Examples
/// ```
/// use nndescent_core::AdjacencySource;
///
/// let adjacency = vec![vec![1], vec![0, 2], vec![1]];
/// assert_eq!(adjacency.neighbours(1), vec![0, 2]);
/// assert!(adjacency.neighbours(7).is_empty());
/// ```
pub trait AdjacencySource: Sync {
    /// Returns the nodes adjacent to `node`. Unknown nodes have none.
    fn neighbours(&self, node: usize) -> Vec<usize>;
}

impl AdjacencySource for [Vec<usize>] {
    fn neighbours(&self, node: usize) -> Vec<usize> {
        self.get(node).cloned().unwrap_or_default()
    }
}

impl AdjacencySource for Vec<Vec<usize>> {
    fn neighbours(&self, node: usize) -> Vec<usize> {
        self.as_slice().neighbours(node)
    }
}

impl<A: AdjacencySource + ?Sized> AdjacencySource for &A {
    fn neighbours(&self, node: usize) -> Vec<usize> {
        (**self).neighbours(node)
    }
}

/// Draws up to `k` distinct candidates for `node`, never `node` itself.
///
/// When `k` covers every other node all of them are returned in id order.
pub(crate) fn candidates<R: Rng + ?Sized>(
    kind: SamplerKind,
    node: usize,
    node_count: usize,
    k: usize,
    adjacency: Option<&dyn AdjacencySource>,
    rng: &mut R,
) -> Vec<usize> {
    let others = node_count.saturating_sub(1);
    if k >= others {
        return (0..node_count).filter(|&other| other != node).collect();
    }
    let walked = match (kind, adjacency) {
        (SamplerKind::RandomWalk, Some(adjacency)) => {
            random_walk(node, node_count, k, adjacency, rng)
        }
        _ => Vec::with_capacity(k),
    };
    top_up(node, node_count, k, walked, rng)
}

fn random_walk<R: Rng + ?Sized>(
    node: usize,
    node_count: usize,
    k: usize,
    adjacency: &dyn AdjacencySource,
    rng: &mut R,
) -> Vec<usize> {
    let mut picked = Vec::with_capacity(k);
    let mut current = node;
    for _ in 0..k * WALK_STEPS_PER_CANDIDATE {
        if picked.len() == k {
            break;
        }
        let hops = adjacency.neighbours(current);
        let Some(&next) = hops.choose(rng) else {
            if current == node {
                break;
            }
            current = node;
            continue;
        };
        if next >= node_count {
            current = node;
            continue;
        }
        if next != node && !picked.contains(&next) {
            picked.push(next);
        }
        current = if rng.gen_bool(WALK_RESTART_PROBABILITY) {
            node
        } else {
            next
        };
    }
    picked
}

/// Extends `picked` with uniform draws until it holds `k` ids.
///
/// Drawing `picked.len() + missing` distinct ids guarantees at least
/// `missing` of them are not yet picked.
fn top_up<R: Rng + ?Sized>(
    node: usize,
    node_count: usize,
    k: usize,
    mut picked: Vec<usize>,
    rng: &mut R,
) -> Vec<usize> {
    let others = node_count.saturating_sub(1);
    let missing = k.saturating_sub(picked.len());
    if missing == 0 || others == 0 {
        return picked;
    }
    let draws = (picked.len() + missing).min(others);
    for offset in index::sample(rng, others, draws) {
        if picked.len() == k {
            break;
        }
        let candidate = if offset >= node { offset + 1 } else { offset };
        if !picked.contains(&candidate) {
            picked.push(candidate);
        }
    }
    picked
}

/// Fills every node's list with its initial candidates.
pub(crate) fn initialise(ctx: &StageContext<'_>) -> Result<()> {
    let adjacency = match (ctx.sampler, ctx.adjacency) {
        (SamplerKind::RandomWalk, None) => {
            debug!("no adjacency supplied; random walk sampling falls back to uniform");
            None
        }
        (_, adjacency) => adjacency,
    };

    ctx.map_partitions(Stage::Sample, |partition| {
        let mut rng = ctx.rng(Stage::Sample, 0, partition);
        let mut pairs = 0_u64;
        for node in partition.nodes() {
            ctx.check_cancelled(Stage::Sample)?;
            let drawn = candidates(
                ctx.sampler,
                node,
                ctx.node_count,
                ctx.bounded_k,
                adjacency,
                &mut rng,
            );
            for candidate in drawn.into_iter().filter(|&id| ctx.accepts_target(id)) {
                let similarity = ctx.evaluate(node, candidate)?;
                pairs += 1;
                ctx.offer(node, candidate, similarity, &mut rng)?;
            }
        }
        ctx.state.record(0, pairs, 0);
        Ok(())
    })
    .map(drop)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::SmallRng};
    use rstest::rstest;
    use std::collections::HashSet;

    fn assert_valid(drawn: &[usize], node: usize, node_count: usize, k: usize) {
        assert_eq!(drawn.len(), k, "drawn {drawn:?}");
        assert!(!drawn.contains(&node));
        assert!(drawn.iter().all(|&id| id < node_count));
        let unique: HashSet<_> = drawn.iter().collect();
        assert_eq!(unique.len(), drawn.len());
    }

    #[rstest]
    #[case(SamplerKind::Uniform)]
    #[case(SamplerKind::RandomWalk)]
    fn draws_distinct_non_self_candidates(#[case] kind: SamplerKind) {
        let mut rng = SmallRng::seed_from_u64(11);
        let ring: Vec<Vec<usize>> = (0..50).map(|n| vec![(n + 1) % 50, (n + 49) % 50]).collect();
        for node in 0..50 {
            let drawn = candidates(kind, node, 50, 7, Some(&ring), &mut rng);
            assert_valid(&drawn, node, 50, 7);
        }
    }

    #[rstest]
    #[case(2, 1)]
    #[case(5, 4)]
    #[case(5, 9)]
    fn enumerates_everything_when_k_covers_population(
        #[case] node_count: usize,
        #[case] k: usize,
    ) {
        let mut rng = SmallRng::seed_from_u64(3);
        let drawn = candidates(SamplerKind::Uniform, 1, node_count, k, None, &mut rng);
        let expected: Vec<_> = (0..node_count).filter(|&id| id != 1).collect();
        assert_eq!(drawn, expected);
    }

    #[test]
    fn random_walk_prefers_reachable_nodes() {
        let mut rng = SmallRng::seed_from_u64(5);
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); 100];
        adjacency[0] = vec![7];
        adjacency[7] = vec![0];
        let drawn = candidates(SamplerKind::RandomWalk, 0, 100, 1, Some(&adjacency), &mut rng);
        assert_eq!(drawn, vec![7]);
    }

    #[test]
    fn random_walk_tops_up_isolated_nodes() {
        let mut rng = SmallRng::seed_from_u64(9);
        let adjacency: Vec<Vec<usize>> = vec![Vec::new(); 20];
        let drawn = candidates(SamplerKind::RandomWalk, 4, 20, 5, Some(&adjacency), &mut rng);
        assert_valid(&drawn, 4, 20, 5);
    }

    #[test]
    fn random_walk_ignores_out_of_range_adjacency() {
        let mut rng = SmallRng::seed_from_u64(21);
        let adjacency: Vec<Vec<usize>> = vec![vec![99, 1], vec![0]];
        let drawn = candidates(
            SamplerKind::RandomWalk,
            0,
            10,
            3,
            Some(&adjacency as &dyn AdjacencySource),
            &mut rng,
        );
        assert_valid(&drawn, 0, 10, 3);
    }
}
