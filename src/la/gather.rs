//! Collective redistribution of vector entries by global index.
//!
//! Each rank asks the owners of the indices it wants (one personalised
//! all-to-all of requests), owners answer in request order (a second
//! all-to-all of values), and the requester reassembles the answers in the
//! order it asked. Ranks with nothing to ask still take part.

use super::partition::IndexPartition;
use super::vector::DistributedVector;
use crate::comm::collective::{all_to_all_pod, gather_pod};
use crate::comm::{Communicator, tags};
use crate::la_error::LinalgError;

impl<C: Communicator> DistributedVector<C> {
    fn require_gather(&self, op: &'static str) -> Result<(), LinalgError> {
        if self.capabilities().gather {
            Ok(())
        } else {
            Err(LinalgError::Unsupported {
                backend: self.backend(),
                op,
            })
        }
    }

    /// Gather the entries at `indices` into `target`, a vector bound to a
    /// single-process communicator. An unbound target is sized to
    /// `indices.len()`; a bound target must already have that size.
    pub fn gather_into<T: Communicator>(
        &self,
        target: &mut DistributedVector<T>,
        indices: &[u64],
    ) -> Result<(), LinalgError> {
        self.require_gather("gather")?;
        if target.comm().size() != 1 {
            return Err(LinalgError::InvalidTarget(format!(
                "target is distributed over {} processes",
                target.comm().size()
            )));
        }
        if target.is_bound() && target.size() != indices.len() as u64 {
            return Err(LinalgError::DimensionMismatch {
                op: "gather",
                expected: indices.len() as u64,
                found: target.size(),
            });
        }
        let values = self.gather_values(indices)?;
        if !target.is_bound() {
            target.init_size(values.len() as u64);
        }
        target.set_local(&values)
    }

    /// Entries at `indices` (global, any order, duplicates allowed), in the
    /// order requested.
    pub fn gather(&self, indices: &[u64]) -> Result<Vec<f64>, LinalgError> {
        self.require_gather("gather")?;
        self.gather_values(indices)
    }

    /// The whole vector in global order on rank 0; empty on every other rank.
    pub fn gather_on_zero(&self) -> Result<Vec<f64>, LinalgError> {
        self.require_gather("gather_on_zero")?;
        let _t = self.span("la: gather on zero");
        let local = self.get_local();
        let parts = gather_pod(&self.comm, tags::GATHER_ZERO, 0, &local)?;
        // ranges are contiguous and monotonic in rank order
        Ok(parts.concat())
    }

    /// This vector's entries laid out as `layout`'s local range on this rank.
    ///
    /// Only reads owned entries, so every backend supports it, including
    /// those without the `gather` capability.
    pub fn redistribute(&self, layout: &IndexPartition) -> Result<Vec<f64>, LinalgError> {
        if layout.size() != self.size() {
            return Err(LinalgError::DimensionMismatch {
                op: "redistribute",
                expected: self.size(),
                found: layout.size(),
            });
        }
        let (start, end) = layout.local_range();
        let wanted: Vec<u64> = (start..end).collect();
        self.gather_values(&wanted)
    }

    pub(crate) fn gather_values(&self, indices: &[u64]) -> Result<Vec<f64>, LinalgError> {
        let _t = self.span("la: gather");
        let nranks = self.comm.size();
        let size = self.size();

        // 1) bucket requests by owner, remembering where each answer lands
        let mut requests: Vec<Vec<u64>> = vec![Vec::new(); nranks];
        let mut slots = Vec::with_capacity(indices.len());
        for &g in indices {
            let owner = self
                .partition
                .as_ref()
                .and_then(|p| p.owner_of(g))
                .ok_or(LinalgError::IndexOutOfRange { index: g, size })?;
            slots.push((owner, requests[owner].len()));
            requests[owner].push(g);
        }
        log::debug!(
            "rank {}: gathering {} entries from {} owners",
            self.comm.rank(),
            indices.len(),
            requests.iter().filter(|r| !r.is_empty()).count()
        );

        // 2) ship requests
        let incoming = all_to_all_pod(&self.comm, tags::GATHER_REQUEST, &requests)?;

        // 3) answer every request, even after a failure, so peers never stall
        let (start, _) = self.local_range();
        let mut maybe_err = None;
        let replies: Vec<Vec<f64>> = incoming
            .iter()
            .enumerate()
            .map(|(src, wanted)| {
                wanted
                    .iter()
                    .map(|&g| {
                        let local = g.checked_sub(start).map(|i| i as usize);
                        match local.and_then(|i| self.local_entry(i)) {
                            Some(x) => x,
                            None => {
                                maybe_err.get_or_insert(LinalgError::CommError {
                                    neighbor: src,
                                    reason: format!("rank {src} requested unowned index {g}"),
                                });
                                f64::NAN
                            }
                        }
                    })
                    .collect()
            })
            .collect();

        // 4) ship answers
        let answers = all_to_all_pod(&self.comm, tags::GATHER_REPLY, &replies)?;
        if let Some(err) = maybe_err {
            return Err(err);
        }
        for (owner, asked) in requests.iter().enumerate() {
            if answers[owner].len() != asked.len() {
                return Err(LinalgError::CommError {
                    neighbor: owner,
                    reason: format!(
                        "asked for {} entries, received {}",
                        asked.len(),
                        answers[owner].len()
                    ),
                });
            }
        }

        // 5) reassemble in request order
        Ok(slots.iter().map(|&(owner, k)| answers[owner][k]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::NoComm;
    use crate::la::storage::BackendKind;

    #[test]
    fn serial_gather_preserves_request_order() {
        let mut x = DistributedVector::with_size(NoComm, 5, BackendKind::Dense);
        x.set_local(&[0.0, 1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(x.gather(&[4, 0, 4, 2]).unwrap(), vec![4.0, 0.0, 4.0, 2.0]);
        assert!(x.gather(&[]).unwrap().is_empty());
        assert_eq!(x.gather_on_zero().unwrap(), x.get_local());
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let x = DistributedVector::with_size(NoComm, 3, BackendKind::Petsc);
        assert!(matches!(
            x.gather(&[3]),
            Err(LinalgError::IndexOutOfRange { index: 3, size: 3 })
        ));
    }

    #[test]
    fn blocked_backend_cannot_gather() {
        let x = DistributedVector::with_size(NoComm, 3, BackendKind::Tpetra);
        let mut y = DistributedVector::empty(NoComm, BackendKind::Dense);
        assert!(matches!(
            x.gather_into(&mut y, &[0]),
            Err(LinalgError::Unsupported { .. })
        ));
        assert!(x.gather_on_zero().is_err());
    }

    #[test]
    fn target_of_wrong_size_is_rejected() {
        let x = DistributedVector::with_size(NoComm, 3, BackendKind::Dense);
        let mut z = DistributedVector::with_size(NoComm, 3, BackendKind::Dense);
        z.set_all(9.0);
        assert!(matches!(
            x.gather_into(&mut z, &[0]),
            Err(LinalgError::DimensionMismatch { .. })
        ));
        assert_eq!(z.sum().unwrap(), 27.0);
    }
}
