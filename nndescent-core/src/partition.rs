//! Contiguous partitioning of the node-id space.

use std::ops::Range;

use crate::error::{KnnError, Result};

/// A contiguous range of node ids handled by one unit of parallel work.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Partition {
    index: usize,
    nodes: Range<usize>,
}

impl Partition {
    /// Splits `[0, node_count)` into at most `workers` ranges.
    ///
    /// Ranges are contiguous, disjoint, cover every node and differ in size by
    /// at most one. Fewer ranges are produced when `min_batch_size` would
    /// otherwise be undercut; a zero batch size is treated as one.
    ///
    /// # Errors
    /// Returns [`KnnError::InvalidPartition`] when `node_count` or `workers`
    /// is zero.
    ///
    /// # Examples
    /// ```
    /// use nndescent_core::Partition;
    ///
    /// let parts = Partition::range(10, 3, 1)?;
    /// let sizes: Vec<_> = parts.iter().map(Partition::len).collect();
    /// assert_eq!(sizes, vec![4, 3, 3]);
    ///
    /// let coarse = Partition::range(10, 8, 4)?;
    /// assert_eq!(coarse.len(), 2);
    /// # Ok::<(), nndescent_core::KnnError>(())
    /// ```
    pub fn range(node_count: usize, workers: usize, min_batch_size: usize) -> Result<Vec<Self>> {
        if node_count == 0 || workers == 0 {
            return Err(KnnError::InvalidPartition {
                node_count,
                workers,
            });
        }

        let max_batches = (node_count / min_batch_size.max(1)).max(1);
        let count = workers.min(max_batches).min(node_count);
        let base = node_count / count;
        let remainder = node_count % count;

        let mut start = 0;
        Ok((0..count)
            .map(|index| {
                let len = base + usize::from(index < remainder);
                let nodes = start..start + len;
                start += len;
                Self { index, nodes }
            })
            .collect())
    }

    /// Returns the position of this partition in the layout.
    #[must_use]
    #[rustfmt::skip]
    pub fn index(&self) -> usize { self.index }

    /// Returns the node ids covered by this partition.
    #[must_use]
    pub fn nodes(&self) -> Range<usize> {
        self.nodes.clone()
    }

    /// Returns the number of nodes in this partition.
    #[must_use]
    #[rustfmt::skip]
    pub fn len(&self) -> usize { self.nodes.len() }

    /// Returns whether the partition covers no nodes.
    #[must_use]
    #[rustfmt::skip]
    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }
}
