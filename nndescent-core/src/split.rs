//! Old/new neighbour splitting.
//!
//! Each iteration every node's list is divided into entries that already took
//! part in a local join (old) and entries added since (new). Both sides are
//! down-sampled to `sampled_k`; sampled new entries become old for the next
//! iteration.

use rand::{Rng, seq::index};

use crate::{Result, rng::Stage, stage::StageContext};

/// Per-node sampled old and new ids; empty sides are `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct SplitSets {
    pub(crate) old: Vec<Option<Vec<usize>>>,
    pub(crate) new: Vec<Option<Vec<usize>>>,
}

impl SplitSets {
    pub(crate) fn node_count(&self) -> usize {
        self.old.len()
    }

    pub(crate) fn old_of(&self, node: usize) -> &[usize] {
        self.old[node].as_deref().unwrap_or_default()
    }

    pub(crate) fn new_of(&self, node: usize) -> &[usize] {
        self.new[node].as_deref().unwrap_or_default()
    }
}

/// Keeps at most `limit` ids, chosen uniformly without replacement. The kept
/// ids preserve their relative order.
pub(crate) fn sample_ids<R: Rng + ?Sized>(ids: Vec<usize>, limit: usize, rng: &mut R) -> Vec<usize> {
    if ids.len() <= limit {
        return ids;
    }
    let mut picked = index::sample(rng, ids.len(), limit).into_vec();
    picked.sort_unstable();
    picked.into_iter().map(|position| ids[position]).collect()
}

fn non_empty(ids: Vec<usize>) -> Option<Vec<usize>> {
    (!ids.is_empty()).then_some(ids)
}

/// Splits every node's list for `iteration`.
pub(crate) fn split(ctx: &StageContext<'_>, iteration: u32) -> Result<SplitSets> {
    let per_partition = ctx.map_partitions(Stage::Split, |partition| {
        let mut rng = ctx.rng(Stage::Split, iteration, partition);
        let mut sets = Vec::with_capacity(partition.len());
        for node in partition.nodes() {
            ctx.check_cancelled(Stage::Split)?;
            let mut list = ctx.lists.lock(node)?;
            let (old, new) = list.ids_by_age();
            let old = sample_ids(old, ctx.sampled_k, &mut rng);
            let new = sample_ids(new, ctx.sampled_k, &mut rng);
            list.mark_old(&new);
            sets.push((non_empty(old), non_empty(new)));
        }
        Ok(sets)
    })?;

    let (old, new) = per_partition.into_iter().flatten().unzip();
    Ok(SplitSets { old, new })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::SmallRng};
    use rstest::rstest;

    #[rstest]
    #[case(vec![4, 2, 9], 5, vec![4, 2, 9])]
    #[case(vec![], 2, vec![])]
    #[case(vec![7], 0, vec![])]
    fn keeps_small_sets_whole(
        #[case] ids: Vec<usize>,
        #[case] limit: usize,
        #[case] expected: Vec<usize>,
    ) {
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(sample_ids(ids, limit, &mut rng), expected);
    }

    #[test]
    fn down_samples_without_replacement_in_order() {
        let mut rng = SmallRng::seed_from_u64(2);
        let ids: Vec<usize> = (10..30).collect();
        let sampled = sample_ids(ids, 5, &mut rng);
        assert_eq!(sampled.len(), 5);
        assert!(sampled.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(sampled.iter().all(|id| (10..30).contains(id)));
    }
}
