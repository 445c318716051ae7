//! MPI backend (feature = "mpi-support").
//!
//! Point-to-point messages use blocking sends and deferred blocking receives;
//! collectives override the fallbacks with native MPI variable-count calls.

use std::sync::Arc;

use mpi::{Count, Threading};
use mpi::datatype::{Partition, PartitionMut};
use mpi::environment::Universe;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use super::{CommTag, Communicator, Wait};
use crate::la_error::LinalgError;

#[derive(Clone)]
pub struct MpiComm {
    _universe: Arc<Universe>,
    comm: Arc<SimpleCommunicator>,
    rank: usize,
    size: usize,
}

// SAFETY: `new` only hands out a handle once MPI reports
// `MPI_THREAD_MULTIPLE`, which permits concurrent MPI calls on the same
// communicator from any thread. `self_comm` shares that universe.
unsafe impl Send for MpiComm {}
unsafe impl Sync for MpiComm {}

impl MpiComm {
    /// Initialise MPI with `MPI_THREAD_MULTIPLE` and bind to `MPI_COMM_WORLD`.
    ///
    /// Fails with [`LinalgError::MpiThreadLevel`] when the library grants a
    /// lower thread level.
    pub fn new() -> Result<Self, LinalgError> {
        let (universe, provided) = mpi::initialize_with_threading(Threading::Multiple)
            .ok_or(LinalgError::MpiInit)?;
        if provided != Threading::Multiple {
            return Err(LinalgError::MpiThreadLevel(format!("{provided:?}")));
        }
        let world = universe.world();
        Ok(Self::bind(Arc::new(universe), world))
    }

    /// The single-process communicator sharing this handle's MPI universe.
    pub fn self_comm(&self) -> Self {
        Self::bind(self._universe.clone(), SimpleCommunicator::self_comm())
    }

    fn bind(universe: Arc<Universe>, comm: SimpleCommunicator) -> Self {
        let rank = comm.rank() as usize;
        let size = comm.size() as usize;
        Self {
            _universe: universe,
            comm: Arc::new(comm),
            rank,
            size,
        }
    }
}

pub struct MpiSend;

impl Wait for MpiSend {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

pub struct MpiRecv {
    comm: Arc<SimpleCommunicator>,
    peer: i32,
    tag: i32,
}

impl Wait for MpiRecv {
    fn wait(self) -> Option<Vec<u8>> {
        let (data, _status) = self
            .comm
            .process_at_rank(self.peer)
            .receive_vec_with_tag::<u8>(self.tag);
        Some(data)
    }
}

fn displacements(counts: &[Count]) -> Vec<Count> {
    counts
        .iter()
        .scan(0, |acc, &c| {
            let d = *acc;
            *acc += c;
            Some(d)
        })
        .collect()
}

fn split(buf: &[u8], counts: &[Count]) -> Vec<Vec<u8>> {
    let mut out = Vec::with_capacity(counts.len());
    let mut at = 0usize;
    for &c in counts {
        let n = c as usize;
        out.push(buf[at..at + n].to_vec());
        at += n;
    }
    out
}

impl Communicator for MpiComm {
    type SendHandle = MpiSend;
    type RecvHandle = MpiRecv;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiSend {
        self.comm
            .process_at_rank(peer as i32)
            .send_with_tag(buf, tag as i32);
        MpiSend
    }

    fn irecv(&self, peer: usize, tag: u16, _buf: &mut [u8]) -> MpiRecv {
        MpiRecv {
            comm: self.comm.clone(),
            peer: peer as i32,
            tag: tag as i32,
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }

    fn all_gather_bytes(&self, _tag: CommTag, send: &[u8]) -> Result<Vec<Vec<u8>>, LinalgError> {
        let mut counts = vec![0 as Count; self.size];
        self.comm
            .all_gather_into(&(send.len() as Count), &mut counts[..]);
        let displs = displacements(&counts);
        let total: usize = counts.iter().map(|&c| c as usize).sum();
        let mut buf = vec![0u8; total];
        {
            let mut part = PartitionMut::new(&mut buf[..], &counts[..], &displs[..]);
            self.comm.all_gather_varcount_into(send, &mut part);
        }
        Ok(split(&buf, &counts))
    }

    fn all_to_all_bytes(
        &self,
        _tag: CommTag,
        sends: &[Vec<u8>],
    ) -> Result<Vec<Vec<u8>>, LinalgError> {
        if sends.len() != self.size {
            return Err(LinalgError::dims("all_to_all", self.size, sends.len()));
        }
        let send_counts: Vec<Count> = sends.iter().map(|s| s.len() as Count).collect();
        let mut recv_counts = vec![0 as Count; self.size];
        self.comm.all_to_all_into(&send_counts[..], &mut recv_counts[..]);

        let flat: Vec<u8> = sends.concat();
        let send_displs = displacements(&send_counts);
        let recv_displs = displacements(&recv_counts);
        let total: usize = recv_counts.iter().map(|&c| c as usize).sum();
        let mut buf = vec![0u8; total];
        {
            let send_part = Partition::new(&flat[..], &send_counts[..], &send_displs[..]);
            let mut recv_part = PartitionMut::new(&mut buf[..], &recv_counts[..], &recv_displs[..]);
            self.comm.all_to_all_varcount_into(&send_part, &mut recv_part);
        }
        Ok(split(&buf, &recv_counts))
    }

    fn gather_bytes(
        &self,
        _tag: CommTag,
        root: usize,
        send: &[u8],
    ) -> Result<Vec<Vec<u8>>, LinalgError> {
        if root >= self.size {
            return Err(LinalgError::IndexOutOfRange {
                index: root as u64,
                size: self.size as u64,
            });
        }
        let root_process = self.comm.process_at_rank(root as i32);
        let len = send.len() as Count;
        if self.rank != root {
            root_process.gather_into(&len);
            root_process.gather_varcount_into(send);
            return Ok(Vec::new());
        }
        let mut counts = vec![0 as Count; self.size];
        root_process.gather_into_root(&len, &mut counts[..]);
        let displs = displacements(&counts);
        let total: usize = counts.iter().map(|&c| c as usize).sum();
        let mut buf = vec![0u8; total];
        {
            let mut part = PartitionMut::new(&mut buf[..], &counts[..], &displs[..]);
            root_process.gather_varcount_into_root(send, &mut part);
        }
        Ok(split(&buf, &counts))
    }

    fn barrier(&self, _tag: CommTag) -> Result<(), LinalgError> {
        self.comm.barrier();
        Ok(())
    }
}
