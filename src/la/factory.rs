//! Explicit backend selection: configuration plus a vector factory bound to
//! a communicator. The backend is always an argument, never ambient state.

use serde::{Deserialize, Serialize};

use super::storage::BackendKind;
use super::vector::DistributedVector;
use crate::comm::Communicator;

/// Settings for vectors created through a [`VectorFactory`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinalgConfig {
    /// Storage backend for new vectors.
    pub backend: BackendKind,
    /// Record collective operations in the timing registry.
    pub instrument: bool,
}

impl Default for LinalgConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Dense,
            instrument: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct VectorFactory<C: Communicator> {
    comm: C,
    config: LinalgConfig,
}

impl<C: Communicator> VectorFactory<C> {
    pub fn new(comm: C, backend: BackendKind) -> Self {
        Self::from_config(
            comm,
            LinalgConfig {
                backend,
                ..LinalgConfig::default()
            },
        )
    }

    pub fn from_config(comm: C, config: LinalgConfig) -> Self {
        Self { comm, config }
    }

    pub fn backend(&self) -> BackendKind {
        self.config.backend
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    /// Unbound vector; size it later with `init` or `init_size`.
    pub fn create_vector(&self) -> DistributedVector<C> {
        DistributedVector::empty(self.comm.clone(), self.config.backend)
            .with_instrumentation(self.config.instrument)
    }

    pub fn create_vector_with_size(&self, n: u64) -> DistributedVector<C> {
        DistributedVector::with_size(self.comm.clone(), n, self.config.backend)
            .with_instrumentation(self.config.instrument)
    }

    /// Same backend and settings on a different communicator.
    pub fn on<D: Communicator>(&self, comm: D) -> VectorFactory<D> {
        VectorFactory {
            comm,
            config: self.config.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::NoComm;

    #[test]
    fn config_defaults_fill_missing_fields() {
        let cfg: LinalgConfig = serde_json::from_str(r#"{"backend": "petsc"}"#).unwrap();
        assert_eq!(cfg.backend, BackendKind::Petsc);
        assert!(cfg.instrument);
        let cfg: LinalgConfig = serde_json::from_str(r#"{"backend": "eigen"}"#).unwrap();
        assert_eq!(cfg.backend, BackendKind::Dense);
    }

    #[test]
    fn factory_applies_backend() {
        let f = VectorFactory::new(NoComm, BackendKind::Tpetra);
        let v = f.create_vector_with_size(7);
        assert_eq!(v.backend(), BackendKind::Tpetra);
        assert_eq!(v.size(), 7);
        assert!(!f.create_vector().is_bound());
    }
}
