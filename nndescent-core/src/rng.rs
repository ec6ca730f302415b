//! Reproducible random streams for the parallel pipeline stages.
//!
//! Every (stage, iteration, partition) triple draws from its own `SmallRng`
//! whose seed is derived from the base seed by SplitMix64 mixing. With a fixed
//! seed and a fixed partition layout the whole computation is deterministic.

use rand::{SeedableRng, rngs::SmallRng};

/// SplitMix64 increment (the 64-bit golden ratio).
const STREAM_SEED_SPACING: u64 = 0x9E37_79B9_7F4A_7C15;
const SPLITMIX_MULT_A: u64 = 0xBF58_476D_1CE4_E5B9;
const SPLITMIX_MULT_B: u64 = 0x94D0_49BB_1331_11EB;

/// Pipeline stages that consume randomness.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Stage {
    Sample,
    Split,
    Reverse,
    Join,
}

impl Stage {
    const fn salt(self) -> u64 {
        match self {
            Self::Sample => 1,
            Self::Split => 2,
            Self::Reverse => 3,
            Self::Join => 4,
        }
    }

    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Sample => "sample",
            Self::Split => "split",
            Self::Reverse => "reverse",
            Self::Join => "join",
        }
    }
}

#[inline]
fn splitmix64(mut state: u64) -> u64 {
    state = state.wrapping_add(STREAM_SEED_SPACING);
    state = (state ^ (state >> 30)).wrapping_mul(SPLITMIX_MULT_A);
    state = (state ^ (state >> 27)).wrapping_mul(SPLITMIX_MULT_B);
    state ^ (state >> 31)
}

#[inline]
fn mix(seed: u64, lane: u64) -> u64 {
    splitmix64(seed ^ lane.wrapping_add(1).wrapping_mul(STREAM_SEED_SPACING))
}

/// Derives independent partition streams from one base seed.
#[derive(Clone, Copy, Debug)]
pub(crate) struct SeedSequence {
    base: u64,
}

impl SeedSequence {
    pub(crate) fn new(base: u64) -> Self {
        Self { base }
    }

    /// Seeds a sequence from the configured seed or from OS entropy.
    pub(crate) fn from_config(seed: Option<u64>) -> Self {
        Self::new(seed.unwrap_or_else(rand::random))
    }

    pub(crate) fn base(self) -> u64 {
        self.base
    }

    pub(crate) fn stream_seed(self, stage: Stage, iteration: u32, partition: usize) -> u64 {
        let stage_seed = mix(self.base, stage.salt());
        let iteration_seed = mix(stage_seed, u64::from(iteration));
        mix(iteration_seed, partition as u64)
    }

    pub(crate) fn rng(self, stage: Stage, iteration: u32, partition: usize) -> SmallRng {
        SmallRng::seed_from_u64(self.stream_seed(stage, iteration, partition))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use std::collections::HashSet;

    #[test]
    fn streams_are_reproducible() {
        let seeds = SeedSequence::new(42);
        let mut first = seeds.rng(Stage::Join, 3, 1);
        let mut second = seeds.rng(Stage::Join, 3, 1);
        let a: Vec<u64> = (0..8).map(|_| first.r#gen()).collect();
        let b: Vec<u64> = (0..8).map(|_| second.r#gen()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn stream_seeds_differ_across_stage_iteration_and_partition() {
        let seeds = SeedSequence::new(7);
        let mut seen = HashSet::new();
        for stage in [Stage::Sample, Stage::Split, Stage::Reverse, Stage::Join] {
            for iteration in 0..4 {
                for partition in 0..4 {
                    assert!(
                        seen.insert(seeds.stream_seed(stage, iteration, partition)),
                        "duplicate seed for {stage:?}/{iteration}/{partition}",
                    );
                }
            }
        }
    }
}
