//! Approximate k-nearest-neighbour graph construction with NN-descent.
#![cfg_attr(docsrs, feature(doc_cfg))]

mod config;
mod convergence;
mod error;
mod filter;
mod join;
mod knn;
mod neighbour_list;
mod partition;
mod progress;
mod result;
mod reverse;
mod rng;
mod sampler;
mod similarity;
mod split;
mod stage;
#[cfg(test)]
mod test_utils;

pub use crate::{
    config::{KnnConfig, KnnConfigBuilder},
    convergence::{ConvergenceState, ConvergenceTracker},
    error::{KnnError, KnnErrorCode, Result, SimilarityError, SimilarityErrorCode},
    filter::NodeFilter,
    knn::{Knn, KnnContext},
    neighbour_list::{BoundedNeighbourList, NeighbourEntry},
    partition::Partition,
    progress::{CancellationToken, NoopProgress, ProgressTracker, TracingProgress},
    result::{KnnResult, Neighbour, SimilarityResult},
    sampler::{AdjacencySource, SamplerKind},
    similarity::{
        CombinedSimilarity, ScalarSimilarity, SimilarityFunction, SimilarityMetric,
        VectorSimilarity,
    },
};
