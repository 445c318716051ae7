//! Pluggable storage for the local part of a distributed vector.
//!
//! [`BackendStorage`] is the capability interface every backend implements.
//! Backends supply a handful of primitives (entry access, in-order visiting
//! and folding); the arithmetic kernels and local reductions are provided on
//! top of them and may be overridden where a backend has a faster path.
//! All kernels check lengths before touching any entry.

mod dense;
mod petsc;
mod tpetra;

pub use dense::DenseStorage;
pub use petsc::PetscStorage;
pub use tpetra::TpetraStorage;

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::borrow::Cow;
use std::fmt::{self, Debug};
use std::str::FromStr;

use crate::la_error::LinalgError;

/// The storage backends a vector can be built on.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Contiguous `Vec<f64>`; exposes zero-copy views.
    #[default]
    #[serde(alias = "eigen")]
    Dense,
    /// PETSc-style owned array with bracketed access and cached norms.
    Petsc,
    /// Tpetra-style blocked storage; not contiguous.
    Tpetra,
}

impl BackendKind {
    pub fn capabilities(self) -> Capabilities {
        match self {
            BackendKind::Dense => Capabilities {
                contiguous: true,
                gather: true,
            },
            BackendKind::Petsc => Capabilities {
                contiguous: false,
                gather: true,
            },
            BackendKind::Tpetra => Capabilities {
                contiguous: false,
                gather: false,
            },
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BackendKind::Dense => "Dense",
            BackendKind::Petsc => "PETSc",
            BackendKind::Tpetra => "Tpetra",
        })
    }
}

impl FromStr for BackendKind {
    type Err = LinalgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dense" | "eigen" => Ok(BackendKind::Dense),
            "petsc" => Ok(BackendKind::Petsc),
            "tpetra" => Ok(BackendKind::Tpetra),
            _ => Err(LinalgError::UnknownBackend(s.to_string())),
        }
    }
}

/// What a backend can do beyond the mandatory kernels.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Local entries live in one contiguous slice (zero-copy views).
    pub contiguous: bool,
    /// Arbitrary entries can be gathered by global index (`gather`,
    /// `gather_on_zero`). Layout redistribution is available regardless.
    pub gather: bool,
}

/// Norm selector for reductions.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NormKind {
    L1,
    L2,
    Linf,
}

impl FromStr for NormKind {
    type Err = LinalgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "l1" => Ok(NormKind::L1),
            "l2" => Ok(NormKind::L2),
            "linf" => Ok(NormKind::Linf),
            _ => Err(LinalgError::InvalidNorm(s.to_string())),
        }
    }
}

/// Allocate zeroed storage of `len` entries for `kind`.
pub fn create_storage(kind: BackendKind, len: usize) -> Box<dyn BackendStorage> {
    match kind {
        BackendKind::Dense => Box::new(DenseStorage::with_len(len)),
        BackendKind::Petsc => Box::new(PetscStorage::with_len(len)),
        BackendKind::Tpetra => Box::new(TpetraStorage::with_len(len)),
    }
}

fn check_len(op: &'static str, expected: usize, found: usize) -> Result<(), LinalgError> {
    if expected == found {
        Ok(())
    } else {
        Err(LinalgError::dims(op, expected, found))
    }
}

/// Local coefficient storage of one rank.
pub trait BackendStorage: Debug + Send + Sync {
    fn kind(&self) -> BackendKind;

    fn capabilities(&self) -> Capabilities {
        self.kind().capabilities()
    }

    /// Number of locally owned entries.
    fn local_size(&self) -> usize;

    /// Discard all entries and hold `len` zeros.
    fn reset(&mut self, len: usize);

    fn clone_box(&self) -> Box<dyn BackendStorage>;

    fn as_any(&self) -> &dyn Any;

    fn get_entry(&self, local_index: usize) -> Option<f64>;

    fn entry_mut(&mut self, local_index: usize) -> Option<&mut f64>;

    /// Visit every entry in local order.
    fn update(&mut self, f: &mut dyn FnMut(usize, &mut f64));

    /// Fold every entry in local order.
    fn fold(&self, init: f64, f: &mut dyn FnMut(f64, f64) -> f64) -> f64;

    /// Copy of the local entries.
    fn get_local(&self) -> Vec<f64>;

    /// Zero-copy read access.
    fn local_view(&self) -> Result<&[f64], LinalgError> {
        Err(LinalgError::Unsupported {
            backend: self.kind(),
            op: "local_view",
        })
    }

    /// Zero-copy write access.
    fn local_view_mut(&mut self) -> Result<&mut [f64], LinalgError> {
        Err(LinalgError::Unsupported {
            backend: self.kind(),
            op: "local_view_mut",
        })
    }

    /// Borrowed entries when contiguous, otherwise a copy.
    fn values(&self) -> Cow<'_, [f64]> {
        match self.local_view() {
            Ok(v) => Cow::Borrowed(v),
            Err(_) => Cow::Owned(self.get_local()),
        }
    }

    fn zero(&mut self) {
        self.set_all(0.0);
    }

    fn set_all(&mut self, a: f64) {
        self.update(&mut |_, x| *x = a);
    }

    fn scale(&mut self, a: f64) {
        self.update(&mut |_, x| *x *= a);
    }

    /// Add `a` to every entry.
    fn shift(&mut self, a: f64) {
        self.update(&mut |_, x| *x += a);
    }

    fn abs(&mut self) {
        self.update(&mut |_, x| *x = x.abs());
    }

    fn set_entry(&mut self, local_index: usize, value: f64) -> Result<(), LinalgError> {
        let size = self.local_size();
        let slot = self
            .entry_mut(local_index)
            .ok_or(LinalgError::IndexOutOfRange {
                index: local_index as u64,
                size: size as u64,
            })?;
        *slot = value;
        Ok(())
    }

    fn add_entry(&mut self, local_index: usize, value: f64) -> Result<(), LinalgError> {
        let size = self.local_size();
        let slot = self
            .entry_mut(local_index)
            .ok_or(LinalgError::IndexOutOfRange {
                index: local_index as u64,
                size: size as u64,
            })?;
        *slot += value;
        Ok(())
    }

    fn set_local(&mut self, values: &[f64]) -> Result<(), LinalgError> {
        check_len("set_local", self.local_size(), values.len())?;
        self.update(&mut |i, x| *x = values[i]);
        Ok(())
    }

    fn add_local(&mut self, values: &[f64]) -> Result<(), LinalgError> {
        check_len("add_local", self.local_size(), values.len())?;
        self.update(&mut |i, x| *x += values[i]);
        Ok(())
    }

    /// `self += a * other`.
    fn axpy(&mut self, a: f64, other: &dyn BackendStorage) -> Result<(), LinalgError> {
        check_len("axpy", self.local_size(), other.local_size())?;
        let xs = other.values();
        self.update(&mut |i, y| *y += a * xs[i]);
        Ok(())
    }

    fn add(&mut self, other: &dyn BackendStorage) -> Result<(), LinalgError> {
        self.axpy(1.0, other)
    }

    /// Elementwise (Hadamard) product.
    fn multiply(&mut self, other: &dyn BackendStorage) -> Result<(), LinalgError> {
        check_len("multiply", self.local_size(), other.local_size())?;
        let xs = other.values();
        self.update(&mut |i, y| *y *= xs[i]);
        Ok(())
    }

    /// Elementwise quotient.
    fn divide(&mut self, other: &dyn BackendStorage) -> Result<(), LinalgError> {
        check_len("divide", self.local_size(), other.local_size())?;
        let xs = other.values();
        self.update(&mut |i, y| *y /= xs[i]);
        Ok(())
    }

    fn local_sum(&self) -> f64 {
        self.fold(0.0, &mut |acc, x| acc + x)
    }

    fn local_min(&self) -> f64 {
        self.fold(f64::INFINITY, &mut |acc, x| acc.min(x))
    }

    fn local_max(&self) -> f64 {
        self.fold(f64::NEG_INFINITY, &mut |acc, x| acc.max(x))
    }

    /// Local contribution to a norm: `sum |x|` (l1), `sum x^2` (l2), or
    /// `max |x|` (linf). The caller combines ranks and takes the root for l2.
    fn local_norm_partial(&self, kind: NormKind) -> f64 {
        match kind {
            NormKind::L1 => self.fold(0.0, &mut |acc, x| acc + x.abs()),
            NormKind::L2 => self.fold(0.0, &mut |acc, x| acc + x * x),
            NormKind::Linf => self.fold(0.0, &mut |acc, x| acc.max(x.abs())),
        }
    }

    fn local_dot(&self, other: &dyn BackendStorage) -> Result<f64, LinalgError> {
        check_len("inner", self.local_size(), other.local_size())?;
        let (xs, ys) = (self.values(), other.values());
        Ok(xs.iter().zip(ys.iter()).map(|(x, y)| x * y).sum())
    }
}

impl Clone for Box<dyn BackendStorage> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}
