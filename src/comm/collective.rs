//! Point-to-point fallbacks for collective operations, plus typed helpers.
//!
//! The byte-level protocol has two stages per collective, mirroring section
//! completion in a mesh code:
//!
//! 1. every pair exchanges a [`WireCount`] size header on `tag`;
//! 2. non-empty payloads follow on `tag.offset(1)`.
//!
//! All send handles are drained before returning, even if a receive failed;
//! the first failure is reported.

use bytemuck::Pod;

use super::wire::{WireCount, cast_slice, count_for, decode_one, decode_vec};
use super::{CommTag, Communicator, Wait};
use crate::la_error::LinalgError;

/// Associative reduction applied to one `f64` per rank.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Min,
    Max,
}

impl ReduceOp {
    pub fn identity(self) -> f64 {
        match self {
            ReduceOp::Sum => 0.0,
            ReduceOp::Min => f64::INFINITY,
            ReduceOp::Max => f64::NEG_INFINITY,
        }
    }

    pub fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            ReduceOp::Sum => a + b,
            ReduceOp::Min => a.min(b),
            ReduceOp::Max => a.max(b),
        }
    }
}

/// Exchange one buffer with every peer; `outgoing(peer)` names what this rank
/// sends to `peer`. Returns the received buffers indexed by source rank, with
/// this rank's own outgoing buffer in its slot.
pub fn exchange<'a, C, F>(comm: &C, tag: CommTag, outgoing: F) -> Result<Vec<Vec<u8>>, LinalgError>
where
    C: Communicator,
    F: Fn(usize) -> &'a [u8],
{
    let me = comm.rank();
    let peers: Vec<usize> = (0..comm.size()).filter(|&p| p != me).collect();

    // 1) size headers
    let counts = exchange_counts(comm, tag, &peers, |p| outgoing(p).len())?;

    // 2) post receives for non-empty payloads
    let payload_tag = tag.offset(1).as_u16();
    let mut pending_recvs = Vec::with_capacity(peers.len());
    for &p in &peers {
        let n = counts[p];
        if n > 0 {
            let mut buf = vec![0u8; n];
            pending_recvs.push((p, n, comm.irecv(p, payload_tag, &mut buf)));
        }
    }

    // 3) post sends
    let mut pending_sends = Vec::with_capacity(peers.len());
    for &p in &peers {
        let buf = outgoing(p);
        if !buf.is_empty() {
            pending_sends.push(comm.isend(p, payload_tag, buf));
        }
    }

    // 4) wait for all recvs (but do not early-return)
    let mut received = vec![Vec::new(); comm.size()];
    received[me] = outgoing(me).to_vec();
    let mut maybe_err = None;
    for (p, n, h) in pending_recvs {
        match h.wait() {
            Some(data) if data.len() == n => {
                if maybe_err.is_none() {
                    received[p] = data;
                }
            }
            Some(data) if maybe_err.is_none() => {
                maybe_err = Some(LinalgError::CommError {
                    neighbor: p,
                    reason: format!("expected {n} payload bytes, got {}", data.len()),
                });
            }
            None if maybe_err.is_none() => {
                maybe_err = Some(LinalgError::CommError {
                    neighbor: p,
                    reason: format!("failed to receive payload from rank {p}"),
                });
            }
            _ => {} // already have an error; just drain
        }
    }

    // 5) always drain all send handles before returning
    for send in pending_sends {
        let _ = send.wait();
    }

    match maybe_err {
        Some(err) => {
            log::warn!("collective exchange on tag {:#06x} failed: {err}", tag.as_u16());
            Err(err)
        }
        None => Ok(received),
    }
}

/// Collect every rank's buffer on `root`.
pub fn gather_to_root<C: Communicator>(
    comm: &C,
    tag: CommTag,
    root: usize,
    send: &[u8],
) -> Result<Vec<Vec<u8>>, LinalgError> {
    let me = comm.rank();
    if root >= comm.size() {
        return Err(LinalgError::IndexOutOfRange {
            index: root as u64,
            size: comm.size() as u64,
        });
    }
    let payload_tag = tag.offset(1).as_u16();

    if me != root {
        // the oversized marker still goes out so the root fails instead of waiting
        let checked = count_for(root, send.len());
        let count = checked.as_ref().map_or(WireCount::oversized(), |c| *c);
        let header = comm.isend(root, tag.as_u16(), cast_slice(std::slice::from_ref(&count)));
        let body = (!send.is_empty()).then(|| comm.isend(root, payload_tag, send));
        let _ = header.wait();
        if let Some(body) = body {
            let _ = body.wait();
        }
        return checked.map(|_| Vec::new());
    }

    let peers: Vec<usize> = (0..comm.size()).filter(|&p| p != me).collect();
    let mut counts = vec![0usize; comm.size()];
    let mut maybe_err = None;
    let headers: Vec<_> = peers
        .iter()
        .map(|&p| {
            let mut cnt = [0u8; std::mem::size_of::<WireCount>()];
            (p, comm.irecv(p, tag.as_u16(), &mut cnt))
        })
        .collect();
    for (p, h) in headers {
        match recv_count(p, h.wait()) {
            Ok(n) => counts[p] = n,
            Err(e) => {
                maybe_err.get_or_insert(e);
            }
        }
    }
    if let Some(err) = maybe_err {
        return Err(err);
    }

    let mut received = vec![Vec::new(); comm.size()];
    received[me] = send.to_vec();
    for &p in &peers {
        let n = counts[p];
        if n == 0 {
            continue;
        }
        let mut buf = vec![0u8; n];
        match comm.irecv(p, payload_tag, &mut buf).wait() {
            Some(data) if data.len() == n => received[p] = data,
            other => {
                return Err(LinalgError::CommError {
                    neighbor: p,
                    reason: format!(
                        "expected {n} payload bytes, got {}",
                        other.map_or(0, |d| d.len())
                    ),
                });
            }
        }
    }
    Ok(received)
}

/// Posts irecv/isend of one size header per peer; returns counts indexed by rank.
fn exchange_counts<C, L>(
    comm: &C,
    tag: CommTag,
    peers: &[usize],
    len_for: L,
) -> Result<Vec<usize>, LinalgError>
where
    C: Communicator,
    L: Fn(usize) -> usize,
{
    let mut pending_recvs = Vec::with_capacity(peers.len());
    for &p in peers {
        let mut cnt = [0u8; std::mem::size_of::<WireCount>()];
        pending_recvs.push((p, comm.irecv(p, tag.as_u16(), &mut cnt)));
    }

    let mut maybe_err = None;
    let mut pending_sends = Vec::with_capacity(peers.len());
    for &p in peers {
        let count = count_for(p, len_for(p)).unwrap_or_else(|e| {
            maybe_err.get_or_insert(e);
            WireCount::oversized()
        });
        pending_sends.push(comm.isend(p, tag.as_u16(), cast_slice(std::slice::from_ref(&count))));
    }

    let mut counts = vec![0usize; comm.size()];
    for (p, h) in pending_recvs {
        match recv_count(p, h.wait()) {
            Ok(n) => counts[p] = n,
            Err(e) => {
                maybe_err.get_or_insert(e);
            }
        }
    }

    for send in pending_sends {
        let _ = send.wait();
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(counts),
    }
}

fn recv_count(peer: usize, data: Option<Vec<u8>>) -> Result<usize, LinalgError> {
    let data = data.ok_or_else(|| LinalgError::CommError {
        neighbor: peer,
        reason: format!("failed to receive size from rank {peer}"),
    })?;
    decode_one::<WireCount>(peer, &data)?
        .get()
        .ok_or_else(|| LinalgError::CommError {
            neighbor: peer,
            reason: format!("rank {peer} announced a payload past the header limit"),
        })
}

// ===== Typed helpers =========================================================

/// All-gather a slice of `Pod` records; result indexed by rank.
pub fn all_gather_pod<T: Pod, C: Communicator>(
    comm: &C,
    tag: CommTag,
    items: &[T],
) -> Result<Vec<Vec<T>>, LinalgError> {
    let raw = comm.all_gather_bytes(tag, cast_slice(items))?;
    raw.iter()
        .enumerate()
        .map(|(peer, bytes)| decode_vec(peer, bytes))
        .collect()
}

/// Personalised all-to-all of `Pod` records; `sends[r]` goes to rank `r`.
pub fn all_to_all_pod<T: Pod, C: Communicator>(
    comm: &C,
    tag: CommTag,
    sends: &[Vec<T>],
) -> Result<Vec<Vec<T>>, LinalgError> {
    let bytes: Vec<Vec<u8>> = sends.iter().map(|s| cast_slice(s).to_vec()).collect();
    let raw = comm.all_to_all_bytes(tag, &bytes)?;
    raw.iter()
        .enumerate()
        .map(|(peer, bytes)| decode_vec(peer, bytes))
        .collect()
}

/// Gather `Pod` records on `root`; non-root ranks receive an empty list.
pub fn gather_pod<T: Pod, C: Communicator>(
    comm: &C,
    tag: CommTag,
    root: usize,
    items: &[T],
) -> Result<Vec<Vec<T>>, LinalgError> {
    let raw = comm.gather_bytes(tag, root, cast_slice(items))?;
    raw.iter()
        .enumerate()
        .map(|(peer, bytes)| decode_vec(peer, bytes))
        .collect()
}

/// Reduce one value per rank. Contributions are folded in rank order, so
/// every rank obtains a bit-identical result.
pub fn all_reduce_f64<C: Communicator>(
    comm: &C,
    tag: CommTag,
    local: f64,
    op: ReduceOp,
) -> Result<f64, LinalgError> {
    if comm.size() == 1 {
        return Ok(local);
    }
    let all = all_gather_pod(comm, tag, std::slice::from_ref(&local))?;
    Ok(all
        .into_iter()
        .flatten()
        .fold(op.identity(), |acc, x| op.apply(acc, x)))
}
