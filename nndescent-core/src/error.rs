//! Error types for the nndescent core library.
//!
//! Defines error enums exposed by the public API and a convenient result alias.

use std::fmt;

use thiserror::Error;

macro_rules! define_error_codes {
    (
        $(#[$enum_meta:meta])*
        enum $CodeTy:ident for $ErrTy:ident {
            $(
                $(#[$variant_meta:meta])*
                $CodeVariant:ident => $ErrVariant:ident $( { $($pattern:tt)* } )? => $code:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        #[non_exhaustive]
        pub enum $CodeTy {
            $(
                $(#[$variant_meta])*
                $CodeVariant,
            )+
        }

        impl $CodeTy {
            /// Return the stable machine-readable representation of this error code.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$CodeVariant => $code,)+
                }
            }
        }

        impl fmt::Display for $CodeTy {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $ErrTy {
            #[doc = concat!(
                "Retrieve the stable [`",
                stringify!($CodeTy),
                "`] for this error."
            )]
            #[must_use]
            pub const fn code(&self) -> $CodeTy {
                match self {
                    $(Self::$ErrVariant $( { $($pattern)* } )? => $CodeTy::$CodeVariant,)+
                }
            }
        }
    };
}

/// An error produced by a [`crate::SimilarityFunction`].
///
/// Returning `Ok(f64::NAN)` is the way to signal "no valid comparison"; an
/// error is reserved for failures that must abort the whole computation.
#[non_exhaustive]
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum SimilarityError {
    /// Requested node was outside the population backing the function.
    #[error("node {index} is out of bounds")]
    OutOfBounds {
        /// The requested node identifier.
        index: usize,
    },
    /// Compared property vectors had different dimensions.
    #[error("dimension mismatch: left={left}, right={right}")]
    DimensionMismatch {
        /// Dimensionality of the left-hand vector.
        left: usize,
        /// Dimensionality of the right-hand vector.
        right: usize,
    },
    /// The similarity function failed for a reason of its own.
    #[error("similarity computation failed: {message}")]
    Failed {
        /// Description supplied by the implementation.
        message: String,
    },
}

define_error_codes! {
    /// Stable codes describing [`SimilarityError`] variants.
    enum SimilarityErrorCode for SimilarityError {
        /// Requested node was outside the population backing the function.
        OutOfBounds => OutOfBounds { .. } => "SIMILARITY_OUT_OF_BOUNDS",
        /// Compared property vectors had different dimensions.
        DimensionMismatch => DimensionMismatch { .. } => "SIMILARITY_DIMENSION_MISMATCH",
        /// The similarity function failed for a reason of its own.
        Failed => Failed { .. } => "SIMILARITY_FAILED",
    }
}

/// Error type produced when configuring or running [`crate::Knn`].
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum KnnError {
    /// A configuration value was outside its accepted range.
    #[error("invalid configuration for `{field}`: {reason}")]
    InvalidConfig {
        /// Name of the offending configuration field.
        field: &'static str,
        /// Human-readable explanation of the accepted range.
        reason: String,
    },
    /// The node population is too small to have any neighbours.
    #[error("node_count must be at least 2 (got {node_count})")]
    InsufficientNodes {
        /// The node count supplied by the caller.
        node_count: usize,
    },
    /// Partitioning was requested with a zero-sized input.
    #[error("cannot partition {node_count} nodes across {workers} workers")]
    InvalidPartition {
        /// Number of nodes to partition.
        node_count: usize,
        /// Number of workers requested.
        workers: usize,
    },
    /// The similarity function reported a failure.
    #[error("similarity `{similarity}` failed for ({left}, {right}): {error}")]
    Similarity {
        /// Name of the similarity function.
        similarity: String,
        /// Left-hand node of the failed comparison.
        left: usize,
        /// Right-hand node of the failed comparison.
        right: usize,
        /// Underlying failure.
        #[source]
        error: SimilarityError,
    },
    /// The similarity function returned an infinite value.
    #[error("similarity `{similarity}` returned a non-finite value for ({left}, {right})")]
    NonFiniteSimilarity {
        /// Name of the similarity function.
        similarity: String,
        /// Left-hand node of the comparison.
        left: usize,
        /// Right-hand node of the comparison.
        right: usize,
    },
    /// A synchronisation primitive became poisoned after a panic.
    #[error("lock for {resource} is poisoned")]
    LockPoisoned {
        /// Name of the locked resource that was poisoned.
        resource: &'static str,
    },
    /// The worker pool could not be created.
    #[error("failed to build worker pool: {message}")]
    ThreadPool {
        /// Message reported by rayon.
        message: String,
    },
    /// The computation observed a cancellation request and stopped early.
    #[error("computation cancelled during {stage}")]
    Cancelled {
        /// Pipeline stage that observed the request.
        stage: &'static str,
    },
}

define_error_codes! {
    /// Stable codes describing [`KnnError`] variants.
    enum KnnErrorCode for KnnError {
        /// A configuration value was outside its accepted range.
        InvalidConfig => InvalidConfig { .. } => "KNN_INVALID_CONFIG",
        /// The node population is too small to have any neighbours.
        InsufficientNodes => InsufficientNodes { .. } => "KNN_INSUFFICIENT_NODES",
        /// Partitioning was requested with a zero-sized input.
        InvalidPartition => InvalidPartition { .. } => "KNN_INVALID_PARTITION",
        /// The similarity function reported a failure.
        SimilarityFailure => Similarity { .. } => "KNN_SIMILARITY_FAILURE",
        /// The similarity function returned an infinite value.
        NonFiniteSimilarity => NonFiniteSimilarity { .. } => "KNN_NON_FINITE_SIMILARITY",
        /// A synchronisation primitive became poisoned after a panic.
        LockPoisoned => LockPoisoned { .. } => "KNN_LOCK_POISONED",
        /// The worker pool could not be created.
        ThreadPool => ThreadPool { .. } => "KNN_THREAD_POOL",
        /// The computation observed a cancellation request.
        Cancelled => Cancelled { .. } => "KNN_CANCELLED",
    }
}

impl KnnError {
    /// Retrieve the inner [`SimilarityErrorCode`] when the error originated in
    /// a [`crate::SimilarityFunction`].
    #[must_use]
    pub const fn similarity_code(&self) -> Option<SimilarityErrorCode> {
        match self {
            Self::Similarity { error, .. } => Some(error.code()),
            _ => None,
        }
    }

    /// Returns `true` when the computation stopped because it was cancelled
    /// rather than because something failed.
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Returns `true` for errors detected before any work started.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. } | Self::InsufficientNodes { .. } | Self::InvalidPartition { .. }
        )
    }

    pub(crate) fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}

/// Convenient alias for results returned by the core API.
pub type Result<T> = core::result::Result<T, KnnError>;
