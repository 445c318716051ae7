//! PETSc-style storage.
//!
//! The owned array is only reachable through bracketed access, so no
//! zero-copy view is handed out. Every mutation bumps an object state counter;
//! local norm partials are cached against that counter.

use parking_lot::Mutex;
use std::any::Any;
use std::fmt::{self, Debug};

use super::{BackendKind, BackendStorage, NormKind};

#[derive(Default)]
struct NormCache {
    state: u64,
    partials: [Option<f64>; 3],
}

fn slot(kind: NormKind) -> usize {
    match kind {
        NormKind::L1 => 0,
        NormKind::L2 => 1,
        NormKind::Linf => 2,
    }
}

pub struct PetscStorage {
    array: Box<[f64]>,
    state: u64,
    norms: Mutex<NormCache>,
}

impl PetscStorage {
    pub fn with_len(len: usize) -> Self {
        Self {
            array: vec![0.0; len].into_boxed_slice(),
            state: 0,
            norms: Mutex::new(NormCache::default()),
        }
    }

    /// Counter bumped on every mutation.
    pub fn object_state(&self) -> u64 {
        self.state
    }

    /// Run `f` with the array checked out, the way `VecGetArray` /
    /// `VecRestoreArray` bracket access.
    pub fn with_array<R>(&self, f: impl FnOnce(&[f64]) -> R) -> R {
        f(&self.array)
    }

    fn touch(&mut self) {
        self.state = self.state.wrapping_add(1);
    }
}

impl Clone for PetscStorage {
    fn clone(&self) -> Self {
        Self {
            array: self.array.clone(),
            state: self.state,
            norms: Mutex::new(NormCache::default()),
        }
    }
}

impl Debug for PetscStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PetscStorage")
            .field("len", &self.array.len())
            .field("state", &self.state)
            .finish()
    }
}

impl BackendStorage for PetscStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Petsc
    }

    fn local_size(&self) -> usize {
        self.array.len()
    }

    fn reset(&mut self, len: usize) {
        self.array = vec![0.0; len].into_boxed_slice();
        self.touch();
    }

    fn clone_box(&self) -> Box<dyn BackendStorage> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn get_entry(&self, local_index: usize) -> Option<f64> {
        self.array.get(local_index).copied()
    }

    fn entry_mut(&mut self, local_index: usize) -> Option<&mut f64> {
        self.touch();
        self.array.get_mut(local_index)
    }

    fn update(&mut self, f: &mut dyn FnMut(usize, &mut f64)) {
        self.touch();
        for (i, x) in self.array.iter_mut().enumerate() {
            f(i, x);
        }
    }

    fn fold(&self, init: f64, f: &mut dyn FnMut(f64, f64) -> f64) -> f64 {
        self.with_array(|a| a.iter().fold(init, |acc, &x| f(acc, x)))
    }

    fn get_local(&self) -> Vec<f64> {
        self.with_array(<[f64]>::to_vec)
    }

    fn local_norm_partial(&self, kind: NormKind) -> f64 {
        let mut cache = self.norms.lock();
        if cache.state != self.state {
            *cache = NormCache {
                state: self.state,
                partials: [None; 3],
            };
        }
        *cache.partials[slot(kind)].get_or_insert_with(|| match kind {
            NormKind::L1 => self.array.iter().map(|x| x.abs()).sum(),
            NormKind::L2 => self.array.iter().map(|x| x * x).sum(),
            NormKind::Linf => self.array.iter().fold(0.0, |acc: f64, x| acc.max(x.abs())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn norm_cache_invalidated_by_mutation() {
        let mut s = PetscStorage::with_len(4);
        s.set_all(-2.0);
        assert_eq!(s.local_norm_partial(NormKind::L1), 8.0);
        let before = s.object_state();
        s.set_entry(0, 10.0).unwrap();
        assert!(s.object_state() > before);
        assert_eq!(s.local_norm_partial(NormKind::L1), 16.0);
        assert_eq!(s.local_norm_partial(NormKind::Linf), 10.0);
    }

    #[test]
    fn no_zero_copy_access() {
        let mut s = PetscStorage::with_len(2);
        assert!(s.local_view().is_err());
        assert!(s.local_view_mut().is_err());
        assert_eq!(s.values().len(), 2);
    }
}
