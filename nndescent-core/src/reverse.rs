//! Reverse neighbour index.
//!
//! Inverts the sampled old/new sets: `u` appears in `reverse_old[v]` whenever
//! `v` is in `old[u]`, and likewise for new. The index is built concurrently
//! into a sharded map and then frozen into per-node sorted lists.

use dashmap::DashMap;

use crate::{Result, rng::Stage, split::SplitSets, stage::StageContext};

/// Per-node reverse old and new ids. `None` means no node points here.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ReverseNeighbours {
    pub(crate) old: Vec<Option<Vec<usize>>>,
    pub(crate) new: Vec<Option<Vec<usize>>>,
}

impl ReverseNeighbours {
    pub(crate) fn old_of(&self, node: usize) -> Option<&[usize]> {
        self.old[node].as_deref()
    }

    pub(crate) fn new_of(&self, node: usize) -> Option<&[usize]> {
        self.new[node].as_deref()
    }
}

/// Builds the reverse index from a complete split.
pub(crate) fn build(ctx: &StageContext<'_>, sets: &SplitSets) -> Result<ReverseNeighbours> {
    let node_count = sets.node_count();
    let old_map: DashMap<usize, Vec<usize>> = DashMap::new();
    let new_map: DashMap<usize, Vec<usize>> = DashMap::new();

    ctx.map_partitions(Stage::Reverse, |partition| {
        for source in partition.nodes() {
            ctx.check_cancelled(Stage::Reverse)?;
            for &target in sets.old_of(source) {
                old_map.entry(target).or_default().push(source);
            }
            for &target in sets.new_of(source) {
                new_map.entry(target).or_default().push(source);
            }
        }
        Ok(())
    })?;

    Ok(ReverseNeighbours {
        old: freeze(old_map, node_count),
        new: freeze(new_map, node_count),
    })
}

fn freeze(map: DashMap<usize, Vec<usize>>, node_count: usize) -> Vec<Option<Vec<usize>>> {
    let mut frozen = vec![None; node_count];
    for (target, mut sources) in map {
        sources.sort_unstable();
        if let Some(slot) = frozen.get_mut(target) {
            *slot = Some(sources);
        }
    }
    frozen
}
