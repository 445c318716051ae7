//! Distributed vectors over pluggable storage backends.

pub mod factory;
mod gather;
mod ops;
pub mod partition;
pub mod promote;
pub mod storage;
pub mod vector;

pub use factory::{LinalgConfig, VectorFactory};
pub use partition::{IndexPartition, balanced_range};
pub use promote::{ForeignScalar, PromotionRule, ScalarKind, promote, promotion_rule};
pub use storage::{BackendKind, BackendStorage, Capabilities, NormKind};
pub use vector::{ApplyMode, DistributedVector};
