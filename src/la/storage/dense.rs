//! `Vec`-backed storage (default backend).

use std::any::Any;
use std::fmt::{self, Debug};

use super::{BackendKind, BackendStorage, NormKind};
use crate::la_error::LinalgError;

#[derive(Clone, Default)]
pub struct DenseStorage(pub(crate) Vec<f64>);

impl Debug for DenseStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DenseStorage")
            .field("len", &self.0.len())
            .finish()
    }
}

impl DenseStorage {
    pub fn with_len(len: usize) -> Self {
        Self(vec![0.0; len])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl From<Vec<f64>> for DenseStorage {
    fn from(v: Vec<f64>) -> Self {
        Self(v)
    }
}

impl BackendStorage for DenseStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Dense
    }

    fn local_size(&self) -> usize {
        self.0.len()
    }

    fn reset(&mut self, len: usize) {
        self.0.clear();
        self.0.resize(len, 0.0);
    }

    fn clone_box(&self) -> Box<dyn BackendStorage> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn get_entry(&self, local_index: usize) -> Option<f64> {
        self.0.get(local_index).copied()
    }

    fn entry_mut(&mut self, local_index: usize) -> Option<&mut f64> {
        self.0.get_mut(local_index)
    }

    fn update(&mut self, f: &mut dyn FnMut(usize, &mut f64)) {
        for (i, x) in self.0.iter_mut().enumerate() {
            f(i, x);
        }
    }

    fn fold(&self, init: f64, f: &mut dyn FnMut(f64, f64) -> f64) -> f64 {
        self.0.iter().fold(init, |acc, &x| f(acc, x))
    }

    fn get_local(&self) -> Vec<f64> {
        self.0.clone()
    }

    fn local_view(&self) -> Result<&[f64], LinalgError> {
        Ok(&self.0)
    }

    fn local_view_mut(&mut self) -> Result<&mut [f64], LinalgError> {
        Ok(&mut self.0)
    }

    fn set_all(&mut self, a: f64) {
        self.0.fill(a);
    }

    fn set_local(&mut self, values: &[f64]) -> Result<(), LinalgError> {
        if values.len() != self.0.len() {
            return Err(LinalgError::dims("set_local", self.0.len(), values.len()));
        }
        self.0.copy_from_slice(values);
        Ok(())
    }

    fn local_sum(&self) -> f64 {
        self.0.iter().sum()
    }

    fn local_norm_partial(&self, kind: NormKind) -> f64 {
        match kind {
            NormKind::L1 => self.0.iter().map(|x| x.abs()).sum(),
            NormKind::L2 => self.0.iter().map(|x| x * x).sum(),
            NormKind::Linf => self.0.iter().fold(0.0, |acc: f64, x| acc.max(x.abs())),
        }
    }
}
