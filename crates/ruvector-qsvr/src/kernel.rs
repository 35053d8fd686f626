//! Fidelity quantum kernel.
//!
//! # Mathematical Background
//!
//! A feature map encodes classical data x into a quantum state:
//!
//! ```text
//! |psi(x)> = U(x)|0>^n
//! ```
//!
//! and the kernel is the fidelity between two encoded states:
//!
//! ```text
//! k(x, y) = |<psi(x)|psi(y)>|^2
//! ```
//!
//! On the exact backend this is computed from statevectors. On the sampled
//! backend it is the all-zeros frequency of `U(y)^† U(x)|0>` over a fixed
//! number of shots.
//!
//! # References
//!
//! - Schuld, M., & Killoran, N. (2019). "Quantum Machine Learning in Feature Hilbert Spaces"
//! - Havlicek et al. (2019). "Supervised learning with quantum-enhanced feature spaces"

use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::backend::ExecutionBackend;
use crate::error::{QsvrError, Result};
use crate::feature_map::ZZFeatureMap;
use crate::matrix::KernelMatrixBuilder;
use crate::statevector::Statevector;

/// Quantum kernel: a feature map plus an execution backend.
///
/// `QuantumKernel::default()` is the *empty* kernel: it has no feature map and
/// every evaluation fails with [`QsvrError::Configuration`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantumKernel {
    feature_map: Option<ZZFeatureMap>,
    backend: ExecutionBackend,
    /// Project the training kernel matrix onto the PSD cone.
    enforce_psd: bool,
}

impl Default for QuantumKernel {
    fn default() -> Self {
        Self {
            feature_map: None,
            backend: ExecutionBackend::Exact,
            enforce_psd: true,
        }
    }
}

impl QuantumKernel {
    /// Create a kernel from a feature map and backend.
    pub fn new(feature_map: ZZFeatureMap, backend: ExecutionBackend) -> Result<Self> {
        backend.validate()?;
        Ok(Self {
            feature_map: Some(feature_map),
            backend,
            enforce_psd: true,
        })
    }

    /// Kernel on the exact (statevector) backend.
    pub fn exact(feature_map: ZZFeatureMap) -> Self {
        Self {
            feature_map: Some(feature_map),
            ..Default::default()
        }
    }

    /// Toggle PSD projection of the training kernel matrix.
    pub fn with_enforce_psd(mut self, enforce_psd: bool) -> Self {
        self.enforce_psd = enforce_psd;
        self
    }

    /// Whether the kernel lacks a feature map.
    pub fn is_empty(&self) -> bool {
        self.feature_map.is_none()
    }

    /// The feature map, if any.
    pub fn feature_map(&self) -> Option<&ZZFeatureMap> {
        self.feature_map.as_ref()
    }

    /// Replace the feature map.
    pub fn set_feature_map(&mut self, feature_map: ZZFeatureMap) {
        self.feature_map = Some(feature_map);
    }

    /// The execution backend.
    pub fn backend(&self) -> ExecutionBackend {
        self.backend
    }

    /// Replace the execution backend.
    pub fn set_backend(&mut self, backend: ExecutionBackend) -> Result<()> {
        backend.validate()?;
        self.backend = backend;
        Ok(())
    }

    /// Whether the training kernel matrix is projected onto the PSD cone.
    pub fn enforce_psd(&self) -> bool {
        self.enforce_psd
    }

    /// Number of features the kernel expects, if configured.
    pub fn feature_dimension(&self) -> Option<usize> {
        self.feature_map.as_ref().map(ZZFeatureMap::feature_dimension)
    }

    pub(crate) fn require_feature_map(&self) -> Result<&ZZFeatureMap> {
        self.feature_map.as_ref().ok_or_else(|| {
            QsvrError::configuration("quantum kernel has no feature map; provide one before use")
        })
    }

    /// Encode a data point into `|psi(x)>`.
    pub fn encode_feature_map(&self, x: ArrayView1<f64>) -> Result<Statevector> {
        self.require_feature_map()?.encode(x)
    }

    /// Kernel value for two already-encoded points.
    pub(crate) fn value_from_states(
        &self,
        phi_x: &Statevector,
        phi_y: &Statevector,
        x: ArrayView1<f64>,
        y: ArrayView1<f64>,
    ) -> Result<f64> {
        let fidelity = phi_x.fidelity(phi_y)?;
        if self.backend.is_exact() {
            return Ok(fidelity);
        }
        // Identical inputs match the unit training diagonal.
        if bitwise_equal(x, y) {
            return Ok(1.0);
        }
        let (xs, ys) = (x.to_vec(), y.to_vec());
        self.backend.estimate(fidelity, &xs, &ys)
    }

    /// Compute the quantum kernel value between two data points.
    ///
    /// ```text
    /// k(x, y) = |<psi(x)|psi(y)>|^2
    /// ```
    pub fn evaluate(&self, x: ArrayView1<f64>, y: ArrayView1<f64>) -> Result<f64> {
        let phi_x = self.encode_feature_map(x)?;
        let phi_y = self.encode_feature_map(y)?;
        self.value_from_states(&phi_x, &phi_y, x, y)
    }

    /// Symmetric kernel matrix `K[i, j] = k(X[i], X[j])`.
    pub fn kernel_matrix(&self, data: ArrayView2<f64>) -> Result<Array2<f64>> {
        KernelMatrixBuilder::new(Some(self)).build(data)
    }

    /// Cross-kernel matrix `K[i, j] = k(X[i], Y[j])`.
    pub fn cross_kernel_matrix(
        &self,
        x_data: ArrayView2<f64>,
        y_data: ArrayView2<f64>,
    ) -> Result<Array2<f64>> {
        KernelMatrixBuilder::new(Some(self)).build_cross(x_data, y_data)
    }
}

fn bitwise_equal(x: ArrayView1<f64>, y: ArrayView1<f64>) -> bool {
    x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| a.to_bits() == b.to_bits())
}

impl fmt::Display for QuantumKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.feature_map {
            None => write!(f, "QuantumKernel(empty)"),
            Some(map) => {
                let config = map.config();
                write!(
                    f,
                    "QuantumKernel(ZZFeatureMap(feature_dimension={}, reps={}, entanglement={:?}, alpha={}), backend={:?})",
                    config.feature_dimension, config.reps, config.entanglement, config.alpha, self.backend
                )
            }
        }
    }
}
