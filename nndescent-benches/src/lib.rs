//! Benchmark support crate for nndescent.
//!
//! Provides seeded synthetic vector populations, benchmark parameter labels
//! and an exhaustive recall oracle used by the Criterion benchmarks.

pub mod error;
pub mod params;
pub mod recall;
pub mod source;
