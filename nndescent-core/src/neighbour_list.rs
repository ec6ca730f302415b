//! Bounded, per-node neighbour lists.
//!
//! Each node owns a [`BoundedNeighbourList`] holding at most `k` distinct
//! candidates. Entries are kept ordered by descending similarity with ties
//! broken by ascending id, so the worst entry is always the last one and
//! compaction never has to sort.

use std::{
    cmp::Ordering,
    sync::{Mutex, MutexGuard},
};

use rand::Rng;

use crate::error::{KnnError, Result};

/// A neighbour stored in a [`BoundedNeighbourList`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NeighbourEntry {
    id: usize,
    similarity: f64,
    is_new: bool,
}

impl NeighbourEntry {
    /// Returns the neighbour identifier.
    #[must_use]
    #[rustfmt::skip]
    pub fn id(&self) -> usize { self.id }

    /// Returns the similarity between the owner and this neighbour.
    #[must_use]
    #[rustfmt::skip]
    pub fn similarity(&self) -> f64 { self.similarity }

    /// Whether the entry has not yet taken part in a local join.
    #[must_use]
    #[rustfmt::skip]
    pub fn is_new(&self) -> bool { self.is_new }
}

/// `true` when `(left_sim, left_id)` ranks strictly ahead of
/// `(right_sim, right_id)`: higher similarity first, then lower id.
#[inline]
pub(crate) fn ranks_before(left_sim: f64, left_id: usize, right_sim: f64, right_id: usize) -> bool {
    match left_sim.total_cmp(&right_sim) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => left_id < right_id,
    }
}

/// Fixed-capacity neighbour list for a single owner node.
///
/// # Examples
/// ```
/// use nndescent_core::BoundedNeighbourList;
/// use rand::{SeedableRng, rngs::SmallRng};
///
/// let mut rng = SmallRng::seed_from_u64(1);
/// let mut list = BoundedNeighbourList::new(0, 2);
/// assert!(list.insert(1, 0.5, &mut rng, 0.0));
/// assert!(list.insert(2, 0.9, &mut rng, 0.0));
/// assert!(list.insert(3, 0.7, &mut rng, 0.0));
/// assert!(!list.insert(0, 1.0, &mut rng, 0.0));
/// assert_eq!(list.compact().collect::<Vec<_>>(), vec![2, 3]);
/// ```
#[derive(Clone, Debug)]
pub struct BoundedNeighbourList {
    owner: usize,
    capacity: usize,
    entries: Vec<NeighbourEntry>,
}

impl BoundedNeighbourList {
    /// Creates an empty list for `owner` holding at most `capacity` entries.
    #[must_use]
    pub fn new(owner: usize, capacity: usize) -> Self {
        Self {
            owner,
            capacity,
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Returns the node owning this list.
    #[must_use]
    #[rustfmt::skip]
    pub fn owner(&self) -> usize { self.owner }

    /// Returns the maximum number of retained neighbours.
    #[must_use]
    #[rustfmt::skip]
    pub fn capacity(&self) -> usize { self.capacity }

    /// Returns the number of retained neighbours.
    #[must_use]
    #[rustfmt::skip]
    pub fn len(&self) -> usize { self.entries.len() }

    /// Returns whether the list holds no neighbours.
    #[must_use]
    #[rustfmt::skip]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Returns whether `id` is currently retained.
    #[must_use]
    pub fn contains(&self, id: usize) -> bool {
        self.position(id).is_some()
    }

    /// Offers `candidate` with `similarity` to the list.
    ///
    /// Self-references and `NaN` similarities are rejected. A candidate that
    /// is already present only raises its stored similarity, and a raised
    /// entry is new again. Once the list is
    /// full, the worst entry is evicted when the candidate ranks strictly
    /// better or, failing that, with probability `perturbation_rate` drawn
    /// from `rng`.
    ///
    /// Returns `true` when the list changed.
    pub fn insert<R: Rng + ?Sized>(
        &mut self,
        candidate: usize,
        similarity: f64,
        rng: &mut R,
        perturbation_rate: f64,
    ) -> bool {
        if candidate == self.owner || similarity.is_nan() || self.capacity == 0 {
            return false;
        }

        if let Some(index) = self.position(candidate) {
            let existing = self.entries.remove(index);
            if similarity > existing.similarity {
                self.place(NeighbourEntry {
                    similarity,
                    is_new: true,
                    ..existing
                });
                return true;
            }
            self.entries.insert(index, existing);
            return false;
        }

        if self.entries.len() < self.capacity {
            self.place(NeighbourEntry {
                id: candidate,
                similarity,
                is_new: true,
            });
            return true;
        }

        let Some(worst) = self.entries.last() else {
            return false;
        };
        let improves = ranks_before(similarity, candidate, worst.similarity, worst.id);
        let perturbed =
            !improves && perturbation_rate > 0.0 && rng.gen_bool(perturbation_rate.min(1.0));
        if !(improves || perturbed) {
            return false;
        }

        self.entries.pop();
        self.place(NeighbourEntry {
            id: candidate,
            similarity,
            is_new: true,
        });
        true
    }

    /// Returns the retained ids in rank order.
    ///
    /// The list is kept ordered and deduplicated on every insert, so this is
    /// idempotent and may be called repeatedly.
    pub fn compact(&self) -> impl ExactSizeIterator<Item = usize> + '_ {
        debug_assert!(self.entries.len() <= self.capacity);
        self.entries.iter().map(NeighbourEntry::id)
    }

    /// Returns the retained entries in rank order.
    #[must_use]
    pub fn entries(&self) -> &[NeighbourEntry] {
        &self.entries
    }

    /// Drops every entry whose similarity is below `cutoff`.
    pub fn retain_at_least(&mut self, cutoff: f64) {
        self.entries.retain(|entry| entry.similarity >= cutoff);
    }

    /// Returns `(old, new)` ids in rank order.
    pub(crate) fn ids_by_age(&self) -> (Vec<usize>, Vec<usize>) {
        let (new, old): (Vec<&NeighbourEntry>, Vec<&NeighbourEntry>) =
            self.entries.iter().partition(|entry| entry.is_new);
        (
            old.into_iter().map(|entry| entry.id).collect(),
            new.into_iter().map(|entry| entry.id).collect(),
        )
    }

    /// Drops every entry.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Clears the new flag of every entry listed in `ids`.
    pub(crate) fn mark_old(&mut self, ids: &[usize]) {
        for entry in &mut self.entries {
            if ids.contains(&entry.id) {
                entry.is_new = false;
            }
        }
    }

    fn position(&self, id: usize) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }

    fn place(&mut self, entry: NeighbourEntry) {
        let index = self.entries.partition_point(|existing| {
            ranks_before(existing.similarity, existing.id, entry.similarity, entry.id)
        });
        self.entries.insert(index, entry);
    }
}

/// One lock-protected [`BoundedNeighbourList`] per node.
#[derive(Debug)]
pub(crate) struct NeighbourLists {
    lists: Vec<Mutex<BoundedNeighbourList>>,
}

impl NeighbourLists {
    pub(crate) fn new(node_count: usize, capacity: usize) -> Self {
        Self {
            lists: (0..node_count)
                .map(|owner| Mutex::new(BoundedNeighbourList::new(owner, capacity)))
                .collect(),
        }
    }

    /// Locks the list of `node`, which must be inside the population.
    pub(crate) fn lock(&self, node: usize) -> Result<MutexGuard<'_, BoundedNeighbourList>> {
        self.lists[node]
            .lock()
            .map_err(|_| KnnError::LockPoisoned {
                resource: "neighbour list",
            })
    }

    pub(crate) fn insert<R: Rng + ?Sized>(
        &self,
        node: usize,
        candidate: usize,
        similarity: f64,
        rng: &mut R,
        perturbation_rate: f64,
    ) -> Result<bool> {
        Ok(self
            .lock(node)?
            .insert(candidate, similarity, rng, perturbation_rate))
    }

    pub(crate) fn into_lists(self) -> Result<Vec<BoundedNeighbourList>> {
        self.lists
            .into_iter()
            .map(|list| {
                list.into_inner().map_err(|_| KnnError::LockPoisoned {
                    resource: "neighbour list",
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::SmallRng};
    use rstest::{fixture, rstest};

    #[fixture]
    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(0x5EED)
    }

    fn ids(list: &BoundedNeighbourList) -> Vec<usize> {
        list.compact().collect()
    }

    #[rstest]
    fn rejects_self_and_nan(mut rng: SmallRng) {
        let mut list = BoundedNeighbourList::new(4, 3);
        assert!(!list.insert(4, 0.9, &mut rng, 0.0));
        assert!(!list.insert(1, f64::NAN, &mut rng, 0.0));
        assert!(list.is_empty());
    }

    #[rstest]
    fn orders_by_similarity_then_id(mut rng: SmallRng) {
        let mut list = BoundedNeighbourList::new(0, 4);
        for (id, sim) in [(5, 0.2), (3, 0.8), (9, 0.8), (1, 0.5)] {
            assert!(list.insert(id, sim, &mut rng, 0.0));
        }
        assert_eq!(ids(&list), vec![3, 9, 1, 5]);
    }

    #[rstest]
    fn duplicate_only_raises_similarity(mut rng: SmallRng) {
        let mut list = BoundedNeighbourList::new(0, 3);
        assert!(list.insert(1, 0.4, &mut rng, 0.0));
        assert!(list.insert(2, 0.6, &mut rng, 0.0));
        assert!(!list.insert(1, 0.3, &mut rng, 0.0));
        assert!(!list.insert(1, 0.4, &mut rng, 0.0));
        assert!(list.insert(1, 0.7, &mut rng, 0.0));
        assert_eq!(list.len(), 2);
        assert_eq!(ids(&list), vec![1, 2]);
        assert!((list.entries()[0].similarity() - 0.7).abs() < f64::EPSILON);
    }

    #[rstest]
    fn evicts_worst_only_for_strictly_better_candidates(mut rng: SmallRng) {
        let mut list = BoundedNeighbourList::new(0, 2);
        list.insert(1, 0.9, &mut rng, 0.0);
        list.insert(2, 0.5, &mut rng, 0.0);
        assert!(!list.insert(3, 0.4, &mut rng, 0.0));
        assert!(!list.insert(3, 0.5, &mut rng, 0.0), "equal similarity, higher id");
        assert!(list.insert(1, 0.95, &mut rng, 0.0));
        assert!(list.insert(4, 0.6, &mut rng, 0.0));
        assert_eq!(ids(&list), vec![1, 4]);
    }

    #[rstest]
    fn equal_similarity_prefers_lower_id(mut rng: SmallRng) {
        let mut list = BoundedNeighbourList::new(0, 1);
        list.insert(7, 0.5, &mut rng, 0.0);
        assert!(list.insert(3, 0.5, &mut rng, 0.0));
        assert_eq!(ids(&list), vec![3]);
    }

    #[rstest]
    fn full_perturbation_always_replaces_worst(mut rng: SmallRng) {
        let mut list = BoundedNeighbourList::new(0, 2);
        list.insert(1, 0.9, &mut rng, 1.0);
        list.insert(2, 0.8, &mut rng, 1.0);
        assert!(list.insert(3, 0.1, &mut rng, 1.0));
        assert_eq!(ids(&list), vec![1, 3]);
    }

    #[rstest]
    fn zero_capacity_never_stores(mut rng: SmallRng) {
        let mut list = BoundedNeighbourList::new(0, 0);
        assert!(!list.insert(1, 1.0, &mut rng, 1.0));
        assert_eq!(list.compact().len(), 0);
    }

    #[rstest]
    fn compact_is_idempotent(mut rng: SmallRng) {
        let mut list = BoundedNeighbourList::new(0, 3);
        list.insert(2, 0.1, &mut rng, 0.0);
        list.insert(1, 0.2, &mut rng, 0.0);
        assert_eq!(ids(&list), ids(&list));
    }

    #[rstest]
    fn ages_entries_and_filters_by_cutoff(mut rng: SmallRng) {
        let mut list = BoundedNeighbourList::new(0, 3);
        list.insert(1, 0.9, &mut rng, 0.0);
        list.insert(2, 0.1, &mut rng, 0.0);
        list.insert(3, 0.5, &mut rng, 0.0);
        list.mark_old(&[3]);
        assert_eq!(list.ids_by_age(), (vec![3], vec![1, 2]));

        list.retain_at_least(0.5);
        assert_eq!(ids(&list), vec![1, 3]);
    }

    #[rstest]
    fn raised_entries_rejoin_as_new(mut rng: SmallRng) {
        let mut list = BoundedNeighbourList::new(0, 3);
        list.insert(1, 0.4, &mut rng, 0.0);
        list.insert(2, 0.6, &mut rng, 0.0);
        list.mark_old(&[1, 2]);
        assert_eq!(list.ids_by_age(), (vec![2, 1], vec![]));

        assert!(list.insert(1, 0.8, &mut rng, 0.0));
        assert!(!list.insert(2, 0.5, &mut rng, 0.0));
        assert_eq!(list.ids_by_age(), (vec![2], vec![1]));
        assert!(list.entries()[0].is_new());
    }

    #[test]
    fn poisoned_list_surfaces_as_error() {
        let lists = NeighbourLists::new(2, 1);
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = lists.lock(0).expect("first lock succeeds");
            panic!("poison the list");
        }));
        let err = lists.lock(0).expect_err("poisoned lock must error");
        assert_eq!(
            err,
            KnnError::LockPoisoned {
                resource: "neighbour list"
            }
        );
    }
}
