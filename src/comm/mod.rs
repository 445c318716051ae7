//! Thin façade over intra-process (threads) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! Point-to-point handles are **waitable**; collective operations are
//! provided methods built on them and block until every rank of the group
//! has taken part. Backends with native collectives (MPI) override them.
//!
//! Every rank must enter collective operations in the same order. A rank that
//! never joins a pending collective leaves the others blocked.

pub mod collective;
#[cfg(feature = "mpi-support")]
mod mpi_backend;
pub mod wire;

use bytes::Bytes;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::la_error::LinalgError;

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

/// Message tag reserved for one collective operation.
///
/// A collective uses `tag` for its size headers and `tag.offset(1)` for the
/// payload that follows.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(pub u16);

impl CommTag {
    pub const fn new(base: u16) -> Self {
        CommTag(base)
    }
    pub const fn as_u16(self) -> u16 {
        self.0
    }
    pub const fn offset(self, k: u16) -> Self {
        CommTag(self.0.wrapping_add(k))
    }
}

/// Tags used by the vector layer.
pub mod tags {
    use super::CommTag;

    pub const PARTITION: CommTag = CommTag(0x4C00);
    pub const REDUCE: CommTag = CommTag(0x4C10);
    pub const SUM_ENTRIES: CommTag = CommTag(0x4C20);
    pub const GATHER_REQUEST: CommTag = CommTag(0x4C30);
    pub const GATHER_REPLY: CommTag = CommTag(0x4C40);
    pub const GATHER_ZERO: CommTag = CommTag(0x4C50);
    pub const APPLY: CommTag = CommTag(0x4C60);
}

/// Communication interface: point-to-point primitives plus collectives.
pub trait Communicator: Send + Sync + Clone + 'static {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// Rank of this process within the group.
    fn rank(&self) -> usize;
    /// Number of processes in the group.
    fn size(&self) -> usize;

    fn is_no_comm(&self) -> bool {
        false
    }

    /// Every rank contributes `send`; every rank receives all contributions
    /// indexed by rank.
    fn all_gather_bytes(&self, tag: CommTag, send: &[u8]) -> Result<Vec<Vec<u8>>, LinalgError> {
        collective::exchange(self, tag, |_| send)
    }

    /// Rank `r` receives `sends[r]` from every rank; the result is indexed by
    /// source rank. `sends.len()` must equal `size()`.
    fn all_to_all_bytes(
        &self,
        tag: CommTag,
        sends: &[Vec<u8>],
    ) -> Result<Vec<Vec<u8>>, LinalgError> {
        if sends.len() != self.size() {
            return Err(LinalgError::dims("all_to_all", self.size(), sends.len()));
        }
        collective::exchange(self, tag, |peer| sends[peer].as_slice())
    }

    /// Collect every rank's `send` on `root`, indexed by rank. Non-root ranks
    /// receive an empty list.
    fn gather_bytes(
        &self,
        tag: CommTag,
        root: usize,
        send: &[u8],
    ) -> Result<Vec<Vec<u8>>, LinalgError> {
        collective::gather_to_root(self, tag, root, send)
    }

    /// Block until every rank has reached the barrier.
    fn barrier(&self, tag: CommTag) -> Result<(), LinalgError> {
        self.all_gather_bytes(tag, &[]).map(|_| ())
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// The self communicator: a group holding only the calling process.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) -> Self::SendHandle {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) -> Self::RecvHandle {}

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn is_no_comm(&self) -> bool {
        true
    }
}

// --- RayonComm: intra-process / multi-thread ---
type Key = (u64, usize, usize, u16); // (group, src, dst, tag)

static MAILBOX: Lazy<DashMap<Key, VecDeque<Bytes>>> = Lazy::new(DashMap::new);
static NEXT_GROUP: AtomicU64 = AtomicU64::new(1);

/// Receive handle for [`RayonComm`]; polls the mailbox on `wait`.
pub struct LocalHandle {
    key: Key,
    len: usize,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        loop {
            let popped = MAILBOX
                .get_mut(&self.key)
                .and_then(|mut queue| queue.pop_front());
            if let Some(bytes) = popped {
                MAILBOX.remove_if(&self.key, |_, queue| queue.is_empty());
                let n = self.len.min(bytes.len());
                return Some(bytes[..n].to_vec());
            }
            std::thread::yield_now();
        }
    }
}

/// Simulated process group where every rank is a thread of this process.
///
/// Messages are FIFO per `(group, src, dst, tag)`, so collectives entered in
/// the same order on every rank never cross.
#[derive(Clone, Debug)]
pub struct RayonComm {
    group: u64,
    rank: usize,
    size: usize,
}

impl RayonComm {
    /// Handle for `rank` in the shared default group.
    pub fn new(rank: usize, size: usize) -> Self {
        Self {
            group: 0,
            rank,
            size,
        }
    }

    /// Handles for every rank of a fresh, isolated group of `size` ranks.
    pub fn world(size: usize) -> Vec<Self> {
        let group = NEXT_GROUP.fetch_add(1, Ordering::Relaxed);
        (0..size)
            .map(|rank| Self { group, rank, size })
            .collect()
    }
}

impl Communicator for RayonComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        let key = (self.group, self.rank, peer, tag);
        MAILBOX
            .entry(key)
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle {
        LocalHandle {
            key: (self.group, peer, self.rank, tag),
            len: buf.len(),
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rayon_roundtrip_two_ranks() {
        let comms = RayonComm::world(2);
        let mut recv_buf = [0u8; 4];
        let recv_handle = comms[1].irecv(0, 7, &mut recv_buf);
        let send_handle = comms[0].isend(1, 7, &[1, 2, 3, 4]);
        send_handle.wait();
        let data = recv_handle
            .wait()
            .expect("Expected to receive data from rank 0");
        recv_buf.copy_from_slice(&data);
        assert_eq!(&recv_buf, &[1, 2, 3, 4]);
    }

    #[test]
    fn groups_are_isolated() {
        let a = RayonComm::world(2);
        let b = RayonComm::world(2);
        a[0].isend(1, 3, &[1]);
        b[0].isend(1, 3, &[2]);
        assert_eq!(b[1].irecv(0, 3, &mut [0u8; 1]).wait(), Some(vec![2]));
        assert_eq!(a[1].irecv(0, 3, &mut [0u8; 1]).wait(), Some(vec![1]));
    }

    #[test]
    fn no_comm_collectives_are_local() {
        let comm = NoComm;
        let all = comm.all_gather_bytes(tags::REDUCE, &[9, 8]).unwrap();
        assert_eq!(all, vec![vec![9, 8]]);
        let root = comm.gather_bytes(tags::GATHER_ZERO, 0, &[1]).unwrap();
        assert_eq!(root, vec![vec![1]]);
        comm.barrier(tags::APPLY).unwrap();
    }
}
