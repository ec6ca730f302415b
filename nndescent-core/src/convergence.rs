//! Iteration counters and the convergence state machine.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters shared by the workers of one iteration.
#[derive(Debug, Default)]
pub(crate) struct IterationState {
    updates: AtomicU64,
    comparisons: AtomicU64,
    random_comparisons: AtomicU64,
}

/// Counters drained from an [`IterationState`] after a stage barrier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct IterationCounts {
    pub(crate) updates: u64,
    pub(crate) comparisons: u64,
    pub(crate) random_comparisons: u64,
}

impl IterationCounts {
    /// Every similarity evaluation, including random joins.
    pub(crate) fn node_pairs_considered(self) -> u64 {
        self.comparisons + self.random_comparisons
    }
}

impl IterationState {
    pub(crate) fn record(&self, updates: u64, comparisons: u64, random_comparisons: u64) {
        self.updates.fetch_add(updates, Ordering::Relaxed);
        self.comparisons.fetch_add(comparisons, Ordering::Relaxed);
        self.random_comparisons
            .fetch_add(random_comparisons, Ordering::Relaxed);
    }

    /// Returns the accumulated counts and resets them to zero.
    pub(crate) fn drain(&self) -> IterationCounts {
        IterationCounts {
            updates: self.updates.swap(0, Ordering::AcqRel),
            comparisons: self.comparisons.swap(0, Ordering::AcqRel),
            random_comparisons: self.random_comparisons.swap(0, Ordering::AcqRel),
        }
    }
}

/// Where the refinement loop stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConvergenceState {
    /// More iterations are required.
    Running,
    /// The update ratio fell to or below the threshold.
    Converged,
    /// The iteration cap was reached first.
    MaxIterationsReached,
}

impl ConvergenceState {
    /// Returns `true` for both terminal states.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Decides after every iteration whether refinement should continue.
///
/// # Examples
/// ```
/// use nndescent_core::{ConvergenceState, ConvergenceTracker};
///
/// let mut tracker = ConvergenceTracker::new(0.1, 3);
/// assert_eq!(tracker.observe(50, 100), ConvergenceState::Running);
/// assert_eq!(tracker.observe(5, 100), ConvergenceState::Converged);
/// assert_eq!(tracker.iterations(), 2);
/// ```
#[derive(Clone, Debug)]
pub struct ConvergenceTracker {
    delta_threshold: f64,
    max_iterations: u32,
    iterations: u32,
    last_delta: f64,
    state: ConvergenceState,
}

impl ConvergenceTracker {
    /// Creates a tracker. A `delta_threshold` of zero never converges.
    #[must_use]
    pub fn new(delta_threshold: f64, max_iterations: u32) -> Self {
        Self {
            delta_threshold,
            max_iterations,
            iterations: 0,
            last_delta: f64::NAN,
            state: ConvergenceState::Running,
        }
    }

    /// Records one completed iteration and returns the resulting state.
    ///
    /// Terminal states are sticky.
    pub fn observe(&mut self, updates: u64, comparisons: u64) -> ConvergenceState {
        if self.state.is_terminal() {
            return self.state;
        }
        self.iterations += 1;
        self.last_delta = updates as f64 / comparisons.max(1) as f64;
        self.state = if self.delta_threshold > 0.0 && self.last_delta <= self.delta_threshold {
            ConvergenceState::Converged
        } else if self.iterations >= self.max_iterations {
            ConvergenceState::MaxIterationsReached
        } else {
            ConvergenceState::Running
        };
        self.state
    }

    /// Number of iterations observed so far.
    #[must_use]
    #[rustfmt::skip]
    pub fn iterations(&self) -> u32 { self.iterations }

    /// Update ratio of the latest iteration, `NaN` before the first.
    #[must_use]
    #[rustfmt::skip]
    pub fn last_delta(&self) -> f64 { self.last_delta }

    /// Current state.
    #[must_use]
    #[rustfmt::skip]
    pub fn state(&self) -> ConvergenceState { self.state }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, 1, &[(0, 10)], ConvergenceState::MaxIterationsReached)]
    #[case(1.0, 5, &[(10, 10)], ConvergenceState::Converged)]
    #[case(0.5, 5, &[(0, 0)], ConvergenceState::Converged)]
    #[case(0.1, 2, &[(9, 10), (8, 10)], ConvergenceState::MaxIterationsReached)]
    #[case(0.1, 9, &[(9, 10), (1, 10)], ConvergenceState::Converged)]
    fn terminates_as_expected(
        #[case] threshold: f64,
        #[case] max_iterations: u32,
        #[case] rounds: &[(u64, u64)],
        #[case] expected: ConvergenceState,
    ) {
        let mut tracker = ConvergenceTracker::new(threshold, max_iterations);
        let mut state = ConvergenceState::Running;
        for &(updates, comparisons) in rounds {
            assert_eq!(state, ConvergenceState::Running);
            state = tracker.observe(updates, comparisons);
        }
        assert_eq!(state, expected);
        assert_eq!(tracker.iterations() as usize, rounds.len());
    }

    #[test]
    fn zero_threshold_never_converges() {
        let mut tracker = ConvergenceTracker::new(0.0, 3);
        assert_eq!(tracker.observe(0, 100), ConvergenceState::Running);
        assert_eq!(tracker.observe(0, 100), ConvergenceState::Running);
        assert_eq!(tracker.observe(0, 100), ConvergenceState::MaxIterationsReached);
    }

    #[test]
    fn terminal_state_is_sticky() {
        let mut tracker = ConvergenceTracker::new(0.5, 10);
        assert_eq!(tracker.observe(1, 10), ConvergenceState::Converged);
        assert_eq!(tracker.observe(10, 10), ConvergenceState::Converged);
        assert_eq!(tracker.iterations(), 1);
        assert!((tracker.last_delta() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn iteration_state_drains_and_resets() {
        let state = IterationState::default();
        state.record(2, 10, 3);
        state.record(1, 5, 0);
        let counts = state.drain();
        assert_eq!(
            counts,
            IterationCounts {
                updates: 3,
                comparisons: 15,
                random_comparisons: 3,
            }
        );
        assert_eq!(counts.node_pairs_considered(), 18);
        assert_eq!(state.drain(), IterationCounts::default());
    }
}
