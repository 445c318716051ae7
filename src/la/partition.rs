//! Contiguous ownership of a global index space across the ranks of a group.
//!
//! Every rank keeps the full offset table (`size + 1` entries), so owner
//! lookups and layout comparisons are local and evaluate identically on all
//! ranks.

use crate::comm::collective::all_gather_pod;
use crate::comm::wire::WireRange;
use crate::comm::{Communicator, tags};
use crate::la_error::LinalgError;

/// Balanced block split of `[0, n)` over `size` ranks.
///
/// The lowest `n % size` ranks hold one extra entry.
pub fn balanced_range(rank: usize, size: usize, n: u64) -> (u64, u64) {
    let size = size.max(1) as u64;
    let rank = rank as u64;
    let block = n / size;
    let rem = n % size;
    let start = rank * block + rank.min(rem);
    let end = start + block + u64::from(rank < rem);
    (start, end)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexPartition {
    rank: usize,
    offsets: Vec<u64>,
}

impl IndexPartition {
    /// Balanced partition of `[0, global_size)` over the ranks of `comm`.
    ///
    /// Purely local: every rank derives the same table from `global_size`.
    pub fn create<C: Communicator>(comm: &C, global_size: u64) -> Self {
        let size = comm.size();
        let mut offsets = Vec::with_capacity(size + 1);
        offsets.extend((0..size).map(|r| balanced_range(r, size, global_size).0));
        offsets.push(global_size);
        Self {
            rank: comm.rank(),
            offsets,
        }
    }

    /// Partition from one explicit `(start, end)` per rank.
    ///
    /// Collective: the ranges of all ranks are exchanged once and must tile
    /// `[0, global_size)` in rank order without gaps or overlap. Every rank
    /// validates the same data, so all ranks fail together.
    pub fn create_explicit<C: Communicator>(
        comm: &C,
        local_range: (u64, u64),
    ) -> Result<Self, LinalgError> {
        let (start, end) = local_range;
        let mine = WireRange::new(start, end);
        let ranges: Vec<WireRange> = all_gather_pod(comm, tags::PARTITION, &[mine])?
            .into_iter()
            .flatten()
            .collect();
        if ranges.len() != comm.size() {
            return Err(LinalgError::InvalidLayout(format!(
                "expected {} ranges, received {}",
                comm.size(),
                ranges.len()
            )));
        }

        let mut offsets = Vec::with_capacity(ranges.len() + 1);
        let mut expected_start = 0u64;
        for (r, range) in ranges.iter().enumerate() {
            let (s, e) = (range.start(), range.end());
            if s > e {
                return Err(LinalgError::InvalidLayout(format!(
                    "rank {r} range [{s}, {e}) is reversed"
                )));
            }
            if s < expected_start {
                return Err(LinalgError::InvalidLayout(format!(
                    "rank {r} range [{s}, {e}) overlaps the previous rank (ends at {expected_start})"
                )));
            }
            if s > expected_start {
                return Err(LinalgError::InvalidLayout(format!(
                    "gap [{expected_start}, {s}) before rank {r}"
                )));
            }
            offsets.push(s);
            expected_start = e;
        }
        offsets.push(expected_start);
        log::debug!(
            "rank {}: explicit partition of {} entries, local [{start}, {end})",
            comm.rank(),
            expected_start
        );
        Ok(Self {
            rank: comm.rank(),
            offsets,
        })
    }

    /// Global size.
    pub fn size(&self) -> u64 {
        self.offsets.last().copied().unwrap_or(0)
    }

    pub fn local_range(&self) -> (u64, u64) {
        self.range_of(self.rank)
    }

    pub fn local_size(&self) -> usize {
        let (s, e) = self.local_range();
        (e - s) as usize
    }

    /// Range owned by `rank`; empty for ranks outside the group.
    pub fn range_of(&self, rank: usize) -> (u64, u64) {
        match (self.offsets.get(rank), self.offsets.get(rank + 1)) {
            (Some(&s), Some(&e)) => (s, e),
            _ => (0, 0),
        }
    }

    pub fn num_ranks(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn owns(&self, global_index: u64) -> bool {
        let (s, e) = self.local_range();
        s <= global_index && global_index < e
    }

    /// Rank owning `global_index`, or `None` past the end.
    pub fn owner_of(&self, global_index: u64) -> Option<usize> {
        if global_index >= self.size() {
            return None;
        }
        Some(self.offsets.partition_point(|&o| o <= global_index) - 1)
    }

    /// Same per-rank ranges (and hence same global size).
    pub fn same_layout(&self, other: &IndexPartition) -> bool {
        self.offsets == other.offsets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{NoComm, RayonComm};
    use proptest::prelude::*;

    #[test]
    fn remainder_goes_to_low_ranks() {
        let ranges: Vec<_> = (0..4).map(|r| balanced_range(r, 4, 10)).collect();
        assert_eq!(ranges, vec![(0, 3), (3, 6), (6, 8), (8, 10)]);
    }

    #[test]
    fn owner_skips_empty_ranks() {
        let p = IndexPartition {
            rank: 0,
            offsets: vec![0, 3, 3, 5],
        };
        assert_eq!(p.owner_of(2), Some(0));
        assert_eq!(p.owner_of(3), Some(2));
        assert_eq!(p.owner_of(5), None);
        assert_eq!(p.num_ranks(), 3);
    }

    #[test]
    fn serial_partition_owns_everything() {
        let p = IndexPartition::create(&NoComm, 301);
        assert_eq!(p.local_range(), (0, 301));
        assert!(p.owns(300));
        assert!(!p.owns(301));
    }

    #[test]
    fn explicit_rejects_gap_on_every_rank() {
        let comms = RayonComm::world(2);
        let results: Vec<_> = std::thread::scope(|s| {
            let hs: Vec<_> = comms
                .into_iter()
                .map(|c| {
                    s.spawn(move || {
                        let range = if c.rank() == 0 { (0, 4) } else { (5, 9) };
                        IndexPartition::create_explicit(&c, range)
                    })
                })
                .collect();
            hs.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for r in results {
            assert!(matches!(r, Err(LinalgError::InvalidLayout(_))));
        }
    }

    proptest! {
        #[test]
        fn balanced_ranges_tile_the_index_space(n in 0u64..5000, size in 1usize..17) {
            let mut next = 0;
            for r in 0..size {
                let (s, e) = balanced_range(r, size, n);
                prop_assert_eq!(s, next);
                prop_assert!(e >= s);
                prop_assert!(e - s <= n / size as u64 + 1);
                next = e;
            }
            prop_assert_eq!(next, n);
        }
    }
}
