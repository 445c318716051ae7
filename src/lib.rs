#![cfg_attr(docsrs, feature(doc_cfg))]
//! # dist-la
//!
//! dist-la provides block-distributed vectors of `f64` for PDE and
//! finite-element codes. A vector is partitioned into contiguous ranges of
//! global indices, one per rank, and its local share lives in a pluggable
//! storage backend.
//!
//! ## Features
//! - Balanced or explicit index partitions with rank-local ownership queries
//! - Interchangeable storage backends (`Dense`, `Petsc`, `Tpetra`) with
//!   differing capabilities, selected explicitly per vector or factory
//! - Collective reductions (sum, min, max, norms, dot products) that return
//!   bit-identical results on every rank
//! - Gather of arbitrary global indices onto a single-process vector
//! - Operator overloads with explicit scalar promotion rules
//! - Wall/user/system timing of named tasks and of collective operations
//! - Pluggable communication backends: serial, threads (Rayon-style
//!   in-process mailboxes), and MPI behind the `mpi-support` feature
//!
//! ## Usage
//!
//! ```
//! use dist_la::prelude::*;
//!
//! let factory = VectorFactory::new(NoComm, BackendKind::Dense);
//! let mut v = factory.create_vector_with_size(4);
//! v.set_local(&[1.0, -2.0, 3.0, -4.0]).unwrap();
//! assert_eq!(v.norm(NormKind::L1).unwrap(), 10.0);
//! let w = (&v * 2i64).unwrap();
//! assert_eq!(w.sum().unwrap(), -4.0);
//! ```
//!
//! ## Determinism
//!
//! Reductions combine per-rank partials in rank order, so every rank computes
//! the same floating-point result regardless of message arrival order.

pub mod comm;
pub mod la;
pub mod la_error;
pub mod timing;

/// Commonly used types.
pub mod prelude {
    #[cfg(feature = "mpi-support")]
    pub use crate::comm::MpiComm;
    pub use crate::comm::{CommTag, Communicator, NoComm, RayonComm};
    pub use crate::la::{
        ApplyMode, BackendKind, BackendStorage, DistributedVector, IndexPartition, LinalgConfig,
        NormKind, PromotionRule, ScalarKind, VectorFactory,
    };
    pub use crate::la_error::LinalgError;
    pub use crate::timing::{Timed, Timer, TimingClear, list_timings, timed, timing};
}
