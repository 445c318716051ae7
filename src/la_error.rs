//! LinalgError: Unified error type for dist-la public APIs
//!
//! Every fallible operation on a vector, partition, communicator or timer
//! reports through this enum. Checks run before any storage is mutated, so an
//! `Err` leaves the receiver untouched.

use thiserror::Error;

use crate::la::promote::ScalarKind;
use crate::la::storage::BackendKind;

/// Unified error type for dist-la operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinalgError {
    /// Local or global sizes disagree where they must match.
    #[error("Dimension mismatch in {op}: expected {expected}, found {found}")]
    DimensionMismatch {
        op: &'static str,
        expected: u64,
        found: u64,
    },
    /// Global sizes agree but the per-rank ranges differ.
    #[error("Incompatible parallel layout in {op}: local ranges differ across ranks")]
    IncompatibleLayout { op: &'static str },
    /// Explicit ranges overlap, leave gaps, or are reversed.
    #[error("Invalid index layout: {0}")]
    InvalidLayout(String),
    /// Gather target is not a single-process vector or has the wrong binding.
    #[error("Invalid gather target: {0}")]
    InvalidTarget(String),
    /// The storage backend cannot provide this capability.
    #[error("Operation `{op}` is not supported by the {backend} backend")]
    Unsupported {
        backend: BackendKind,
        op: &'static str,
    },
    /// A foreign scalar cannot be represented losslessly as `f64`.
    #[error("Cannot promote {kind:?} scalar `{value}` to f64 without loss")]
    Promotion { kind: ScalarKind, value: String },
    /// Global (or local) index outside the addressable range.
    #[error("Index {index} out of range for size {size}")]
    IndexOutOfRange { index: u64, size: u64 },
    /// A message to or from `neighbor` failed or had an unexpected shape.
    #[error("Communication error with rank {neighbor}: {reason}")]
    CommError { neighbor: usize, reason: String },
    /// No timing entry has been recorded under this task name.
    #[error("No timing recorded for task `{0}`")]
    UnknownTask(String),
    /// Norm kind string not one of `l1`, `l2`, `linf`.
    #[error("Unknown norm type `{0}` (expected l1, l2 or linf)")]
    InvalidNorm(String),
    /// Apply mode string not one of `insert`, `add`.
    #[error("Unknown apply mode `{0}` (expected insert or add)")]
    InvalidApplyMode(String),
    /// Backend name did not match a known backend.
    #[error("Unknown linear algebra backend `{0}`")]
    UnknownBackend(String),
    /// MPI could not be initialised (already initialised or unavailable).
    #[error("MPI initialization failed")]
    MpiInit,
    /// The MPI library cannot provide `MPI_THREAD_MULTIPLE`.
    #[error("MPI provides {0} thread support, MPI_THREAD_MULTIPLE is required")]
    MpiThreadLevel(String),
}

impl LinalgError {
    pub(crate) fn dims(op: &'static str, expected: usize, found: usize) -> Self {
        LinalgError::DimensionMismatch {
            op,
            expected: expected as u64,
            found: found as u64,
        }
    }
}
