//! Tpetra-style blocked storage.
//!
//! Entries live in fixed-size blocks, so the local part is never one
//! contiguous slice: views are unavailable and gathering by global index is
//! not offered. Redistribution into another layout still works.

use std::any::Any;
use std::fmt::{self, Debug};

use super::{BackendKind, BackendStorage};

/// Entries per block.
pub const BLOCK_LEN: usize = 64;

#[derive(Clone, Default)]
pub struct TpetraStorage {
    blocks: Vec<Box<[f64]>>,
    len: usize,
}

impl TpetraStorage {
    pub fn with_len(len: usize) -> Self {
        let blocks = (0..len.div_ceil(BLOCK_LEN))
            .map(|b| {
                let n = BLOCK_LEN.min(len - b * BLOCK_LEN);
                vec![0.0; n].into_boxed_slice()
            })
            .collect();
        Self { blocks, len }
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }
}

impl Debug for TpetraStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TpetraStorage")
            .field("len", &self.len)
            .field("blocks", &self.blocks.len())
            .finish()
    }
}

impl BackendStorage for TpetraStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Tpetra
    }

    fn local_size(&self) -> usize {
        self.len
    }

    fn reset(&mut self, len: usize) {
        *self = Self::with_len(len);
    }

    fn clone_box(&self) -> Box<dyn BackendStorage> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn get_entry(&self, local_index: usize) -> Option<f64> {
        self.blocks
            .get(local_index / BLOCK_LEN)
            .and_then(|b| b.get(local_index % BLOCK_LEN))
            .copied()
    }

    fn entry_mut(&mut self, local_index: usize) -> Option<&mut f64> {
        self.blocks
            .get_mut(local_index / BLOCK_LEN)
            .and_then(|b| b.get_mut(local_index % BLOCK_LEN))
    }

    fn update(&mut self, f: &mut dyn FnMut(usize, &mut f64)) {
        for (b, block) in self.blocks.iter_mut().enumerate() {
            for (i, x) in block.iter_mut().enumerate() {
                f(b * BLOCK_LEN + i, x);
            }
        }
    }

    fn fold(&self, init: f64, f: &mut dyn FnMut(f64, f64) -> f64) -> f64 {
        self.blocks
            .iter()
            .flat_map(|b| b.iter())
            .fold(init, |acc, &x| f(acc, x))
    }

    fn get_local(&self) -> Vec<f64> {
        self.blocks.concat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_cover_partial_tail() {
        let mut s = TpetraStorage::with_len(2 * BLOCK_LEN + 5);
        assert_eq!(s.num_blocks(), 3);
        s.set_entry(2 * BLOCK_LEN + 4, 7.0).unwrap();
        assert_eq!(s.get_local()[2 * BLOCK_LEN + 4], 7.0);
        assert!(s.set_entry(2 * BLOCK_LEN + 5, 1.0).is_err());
    }
}
