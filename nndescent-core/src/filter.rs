//! Node filters for restricted KNN graphs.
//!
//! A source filter limits which nodes report neighbours in the result; a
//! target filter limits which nodes may be kept as neighbours. Every node
//! still takes part in the refinement so the join can route through nodes
//! that are filtered out of the result.

/// Predicate over node ids.
///
/// Any `Fn(usize) -> bool` that is `Send + Sync` is a filter.
///
/// # Examples
/// ```
/// use nndescent_core::NodeFilter;
///
/// let even = |node: usize| node % 2 == 0;
/// assert!(even.accepts(4));
/// assert!(!even.accepts(3));
/// ```
pub trait NodeFilter: Send + Sync {
    /// Returns whether `node` passes the filter.
    fn accepts(&self, node: usize) -> bool;
}

impl<F> NodeFilter for F
where
    F: Fn(usize) -> bool + Send + Sync,
{
    fn accepts(&self, node: usize) -> bool {
        self(node)
    }
}

/// `true` when no filter is set or `filter` accepts `node`.
pub(crate) fn admits(filter: Option<&dyn NodeFilter>, node: usize) -> bool {
    filter.is_none_or(|predicate| predicate.accepts(node))
}
