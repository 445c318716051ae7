//! Distributed vector: one rank's share of a globally indexed `f64` array.
//!
//! A vector owns its [`IndexPartition`] and its backend storage exclusively;
//! cloning deep-copies both. Reductions and redistribution are collective
//! over the vector's communicator and must be entered by every rank in the
//! same order. Local data movement never communicates.

use itertools::Itertools;
use std::any::Any;
use std::fmt;
use std::str::FromStr;

use super::partition::IndexPartition;
use super::promote::{ForeignScalar, promote};
use super::storage::{BackendKind, BackendStorage, Capabilities, NormKind, create_storage};
use crate::comm::collective::{ReduceOp, all_gather_pod, all_reduce_f64};
use crate::comm::{Communicator, tags};
use crate::la_error::LinalgError;
use crate::timing::Timer;

/// Finalisation mode passed to [`DistributedVector::apply`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ApplyMode {
    Insert,
    Add,
}

impl FromStr for ApplyMode {
    type Err = LinalgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "insert" => Ok(ApplyMode::Insert),
            "add" => Ok(ApplyMode::Add),
            _ => Err(LinalgError::InvalidApplyMode(s.to_string())),
        }
    }
}

#[derive(Clone)]
pub struct DistributedVector<C: Communicator> {
    pub(crate) comm: C,
    pub(crate) partition: Option<IndexPartition>,
    pub(crate) storage: Box<dyn BackendStorage>,
    pub(crate) instrument: bool,
}

impl<C: Communicator> DistributedVector<C> {
    /// Unbound vector of size 0.
    pub fn empty(comm: C, backend: BackendKind) -> Self {
        Self {
            comm,
            partition: None,
            storage: create_storage(backend, 0),
            instrument: true,
        }
    }

    /// Zeroed vector of global size `n`, balanced over the ranks of `comm`.
    pub fn with_size(comm: C, n: u64, backend: BackendKind) -> Self {
        let mut v = Self::empty(comm, backend);
        v.init_size(n);
        v
    }

    /// (Re)initialise with a balanced split of `n` entries. Prior contents
    /// are discarded. Local computation only.
    pub fn init_size(&mut self, n: u64) {
        let partition = IndexPartition::create(&self.comm, n);
        self.storage.reset(partition.local_size());
        self.partition = Some(partition);
    }

    /// (Re)initialise with an explicit local range for this rank. Collective;
    /// prior contents are discarded only once the layout has been validated.
    pub fn init(&mut self, local_range: (u64, u64)) -> Result<(), LinalgError> {
        let partition = {
            let _t = self.span("la: create partition");
            IndexPartition::create_explicit(&self.comm, local_range)?
        };
        self.storage.reset(partition.local_size());
        self.partition = Some(partition);
        Ok(())
    }

    pub(crate) fn with_instrumentation(mut self, on: bool) -> Self {
        self.instrument = on;
        self
    }

    pub(crate) fn span(&self, task: &'static str) -> Option<Timer> {
        self.instrument.then(|| Timer::new(task))
    }

    // ----- queries -----------------------------------------------------------

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn backend(&self) -> BackendKind {
        self.storage.kind()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.storage.capabilities()
    }

    pub fn is_bound(&self) -> bool {
        self.partition.is_some()
    }

    pub fn partition(&self) -> Option<&IndexPartition> {
        self.partition.as_ref()
    }

    /// Global size.
    pub fn size(&self) -> u64 {
        self.partition.as_ref().map_or(0, IndexPartition::size)
    }

    pub fn local_size(&self) -> usize {
        self.storage.local_size()
    }

    pub fn local_range(&self) -> (u64, u64) {
        self.partition
            .as_ref()
            .map_or((0, 0), IndexPartition::local_range)
    }

    pub fn owns_index(&self, global_index: u64) -> bool {
        self.partition
            .as_ref()
            .is_some_and(|p| p.owns(global_index))
    }

    pub fn storage(&self) -> &dyn BackendStorage {
        self.storage.as_ref()
    }

    /// Concrete backend storage, if it is a `T`.
    pub fn as_backend<T: Any>(&self) -> Option<&T> {
        self.storage.as_any().downcast_ref::<T>()
    }

    /// Same global size and the same range on every rank.
    pub fn same_layout<D: Communicator>(&self, other: &DistributedVector<D>) -> bool {
        match (&self.partition, &other.partition) {
            (Some(a), Some(b)) => a.same_layout(b),
            (None, None) => true,
            (Some(p), None) | (None, Some(p)) => p.size() == 0,
        }
    }

    pub(crate) fn check_layout<D: Communicator>(
        &self,
        other: &DistributedVector<D>,
        op: &'static str,
    ) -> Result<(), LinalgError> {
        if self.size() != other.size() {
            return Err(LinalgError::DimensionMismatch {
                op,
                expected: self.size(),
                found: other.size(),
            });
        }
        if !self.same_layout(other) {
            return Err(LinalgError::IncompatibleLayout { op });
        }
        Ok(())
    }

    // ----- local data --------------------------------------------------------

    pub fn zero(&mut self) {
        self.storage.zero();
    }

    /// Set every local entry to `a` (`v[:] = a`).
    pub fn set_all(&mut self, a: f64) {
        self.storage.set_all(a);
    }

    pub fn abs(&mut self) {
        self.storage.abs();
    }

    pub fn get_local(&self) -> Vec<f64> {
        self.storage.get_local()
    }

    pub fn set_local(&mut self, values: &[f64]) -> Result<(), LinalgError> {
        self.storage.set_local(values)
    }

    pub fn add_local(&mut self, values: &[f64]) -> Result<(), LinalgError> {
        self.storage.add_local(values)
    }

    /// Entry at a local index.
    pub fn local_entry(&self, local_index: usize) -> Option<f64> {
        self.storage.get_entry(local_index)
    }

    pub fn set_local_entry(&mut self, local_index: usize, value: f64) -> Result<(), LinalgError> {
        self.storage.set_entry(local_index, value)
    }

    pub fn add_local_entry(&mut self, local_index: usize, value: f64) -> Result<(), LinalgError> {
        self.storage.add_entry(local_index, value)
    }

    /// Read-only zero-copy window over the local entries.
    pub fn local_view(&self) -> Result<&[f64], LinalgError> {
        self.storage.local_view()
    }

    /// Writable zero-copy window over the local entries.
    pub fn local_view_mut(&mut self) -> Result<&mut [f64], LinalgError> {
        self.storage.local_view_mut()
    }

    /// Copy `other`'s entries into `self`. Requires an identical layout.
    pub fn assign(&mut self, other: &DistributedVector<C>) -> Result<(), LinalgError> {
        self.check_layout(other, "assign")?;
        let values = other.storage.values();
        self.storage.set_local(&values)
    }

    /// `self += a * other`.
    pub fn axpy(&mut self, a: f64, other: &DistributedVector<C>) -> Result<(), LinalgError> {
        self.check_layout(other, "axpy")?;
        self.storage.axpy(a, other.storage.as_ref())
    }

    /// Finish a round of insertions. Collective synchronisation point.
    pub fn apply(&mut self, mode: ApplyMode) -> Result<(), LinalgError> {
        log::debug!(
            "rank {}: apply({mode:?}) on {} vector",
            self.comm.rank(),
            self.backend()
        );
        self.comm.barrier(tags::APPLY)
    }

    // ----- in-place arithmetic ---------------------------------------------

    pub fn try_add_assign(&mut self, other: &DistributedVector<C>) -> Result<(), LinalgError> {
        self.check_layout(other, "+=")?;
        self.storage.add(other.storage.as_ref())
    }

    pub fn try_sub_assign(&mut self, other: &DistributedVector<C>) -> Result<(), LinalgError> {
        self.check_layout(other, "-=")?;
        self.storage.axpy(-1.0, other.storage.as_ref())
    }

    pub fn try_mul_assign(&mut self, other: &DistributedVector<C>) -> Result<(), LinalgError> {
        self.check_layout(other, "*=")?;
        self.storage.multiply(other.storage.as_ref())
    }

    pub fn try_div_assign(&mut self, other: &DistributedVector<C>) -> Result<(), LinalgError> {
        self.check_layout(other, "/=")?;
        self.storage.divide(other.storage.as_ref())
    }

    pub fn try_add_scalar<S: ForeignScalar>(&mut self, s: S) -> Result<(), LinalgError> {
        let a = promote(s)?;
        self.storage.shift(a);
        Ok(())
    }

    pub fn try_sub_scalar<S: ForeignScalar>(&mut self, s: S) -> Result<(), LinalgError> {
        let a = promote(s)?;
        self.storage.shift(-a);
        Ok(())
    }

    pub fn try_mul_scalar<S: ForeignScalar>(&mut self, s: S) -> Result<(), LinalgError> {
        let a = promote(s)?;
        self.storage.scale(a);
        Ok(())
    }

    pub fn try_div_scalar<S: ForeignScalar>(&mut self, s: S) -> Result<(), LinalgError> {
        let a = promote(s)?;
        self.storage.scale(1.0 / a);
        Ok(())
    }

    // ----- reductions (collective) ---------------------------------------

    pub fn sum(&self) -> Result<f64, LinalgError> {
        all_reduce_f64(&self.comm, tags::REDUCE, self.storage.local_sum(), ReduceOp::Sum)
    }

    /// Sum of the entries at the given global indices.
    ///
    /// The index lists of all ranks are merged as a set, so each distinct
    /// index contributes once no matter how often or by how many ranks it
    /// was requested. Ranks may pass empty lists.
    pub fn sum_entries(&self, indices: &[u64]) -> Result<f64, LinalgError> {
        let size = self.size();
        if let Some(&bad) = indices.iter().find(|&&i| i >= size) {
            return Err(LinalgError::IndexOutOfRange { index: bad, size });
        }
        let mine: Vec<u64> = indices.iter().copied().sorted_unstable().dedup().collect();
        let all = all_gather_pod(&self.comm, tags::SUM_ENTRIES, &mine)?;
        let (start, _) = self.local_range();
        let local: f64 = all
            .into_iter()
            .kmerge()
            .dedup()
            .filter(|&g| self.owns_index(g))
            .filter_map(|g| self.storage.get_entry((g - start) as usize))
            .sum();
        all_reduce_f64(&self.comm, tags::REDUCE, local, ReduceOp::Sum)
    }

    /// Global minimum; `+inf` for a vector without entries.
    pub fn min(&self) -> Result<f64, LinalgError> {
        all_reduce_f64(&self.comm, tags::REDUCE, self.storage.local_min(), ReduceOp::Min)
    }

    /// Global maximum; `-inf` for a vector without entries.
    pub fn max(&self) -> Result<f64, LinalgError> {
        all_reduce_f64(&self.comm, tags::REDUCE, self.storage.local_max(), ReduceOp::Max)
    }

    pub fn norm(&self, kind: NormKind) -> Result<f64, LinalgError> {
        let partial = self.storage.local_norm_partial(kind);
        match kind {
            NormKind::L1 => all_reduce_f64(&self.comm, tags::REDUCE, partial, ReduceOp::Sum),
            NormKind::L2 => {
                all_reduce_f64(&self.comm, tags::REDUCE, partial, ReduceOp::Sum).map(f64::sqrt)
            }
            NormKind::Linf => all_reduce_f64(&self.comm, tags::REDUCE, partial, ReduceOp::Max),
        }
    }

    /// Global dot product. Requires an identical layout.
    pub fn inner(&self, other: &DistributedVector<C>) -> Result<f64, LinalgError> {
        self.check_layout(other, "inner")?;
        let local = self.storage.local_dot(other.storage.as_ref())?;
        all_reduce_f64(&self.comm, tags::REDUCE, local, ReduceOp::Sum)
    }

    /// Human-readable summary; `verbose` lists this rank's entries.
    pub fn describe(&self, verbose: bool) -> String {
        let mut s = format!(
            "<{} vector of size {}, local range [{}, {}) on rank {}>",
            self.backend(),
            self.size(),
            self.local_range().0,
            self.local_range().1,
            self.comm.rank()
        );
        if verbose {
            s.push_str(&format!(
                "\n[{}]",
                self.storage.values().iter().map(|x| format!("{x:.6e}")).join(", ")
            ));
        }
        s
    }
}

impl<C: Communicator> fmt::Display for DistributedVector<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe(false))
    }
}

impl<C: Communicator> fmt::Debug for DistributedVector<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributedVector")
            .field("rank", &self.comm.rank())
            .field("partition", &self.partition)
            .field("storage", &self.storage)
            .finish()
    }
}
