//! # Ruvector QSVR
//!
//! Support vector regression with a fidelity quantum kernel.
//!
//! Classical data is encoded into quantum states by a ZZ feature map and the
//! kernel is the fidelity between two encoded states. The kernel matrix is fed
//! to an epsilon-insensitive SVR dual solver, and the resulting model is
//! wrapped in a facade with `fit` / `predict` / `score` and tag-checked
//! persistence.
//!
//! ## Features
//!
//! - **Statevector simulation**: exact amplitudes for up to 20 qubits
//! - **ZZ feature map**: configurable repetitions, entanglement and rotation prefactor
//! - **Execution backends**: exact fidelities or deterministic shot-sampled estimates
//! - **SMO solver**: second-order working set selection with shrinking
//! - **Persistence**: JSON envelope that rejects files of other model types
//!
//! ## Quick Start
//!
//! ```rust
//! use ruvector_qsvr::{Qsvr, QsvrConfig, QuantumKernel, ZZFeatureMap};
//! use ndarray::array;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let kernel = QuantumKernel::exact(ZZFeatureMap::with_dimension(2)?);
//! let mut model = Qsvr::with_kernel(kernel, QsvrConfig::default())?;
//!
//! let x = array![[0.0, 0.0], [0.1, 0.1], [0.4, 0.4], [1.0, 1.0]];
//! let y = array![0.0, 0.1, 0.4, 1.0];
//! model.fit(x.view(), y.view())?;
//!
//! let prediction = model.predict(array![[0.5, 0.5]].view())?;
//! println!("prediction = {:.4}", prediction[0]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Mathematical Background
//!
//! ### ZZ Feature Map
//!
//! Each repetition applies a Hadamard layer, a phase `P(alpha * x_i)` on every
//! qubit and, for every entangled pair, a parity phase
//! `alpha * (pi - x_i)(pi - x_j)`.
//!
//! ### Fidelity Kernel
//!
//! k(x, y) = |<psi(x)|psi(y)>|^2, with k(x, x) = 1.
//!
//! ### Epsilon-SVR
//!
//! f(x) = sum_i (a_i - a*_i) k(x_i, x) + b, where the dual coefficients solve
//! the epsilon-insensitive dual under the box constraint `0 <= a, a* <= C`.
//!
//! ## References
//!
//! - Havlicek et al. (2019). "Supervised learning with quantum-enhanced feature spaces"
//! - Schuld, M., & Killoran, N. (2019). "Quantum Machine Learning in Feature Hilbert Spaces"
//! - Fan, R.-E., Chen, P.-H., & Lin, C.-J. (2005). "Working Set Selection Using Second Order
//!   Information for Training SVM"

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod error;
pub mod feature_map;
pub mod kernel;
pub mod linalg;
pub mod matrix;
pub mod metrics;
pub mod model;
pub mod persist;
pub mod statevector;
pub mod svr;
pub mod warning;

// Re-exports for convenience
pub use backend::ExecutionBackend;
pub use error::{QsvrError, Result};
pub use feature_map::{Entanglement, ZZFeatureMap, ZZFeatureMapConfig};
pub use kernel::QuantumKernel;
pub use matrix::KernelMatrixBuilder;
pub use metrics::{mean_squared_error, r2_score};
pub use model::{KernelArgument, ModelState, Qsvr, QsvrConfig, TrainedState};
pub use persist::{SerializableModel, FORMAT_NAME, FORMAT_VERSION};
pub use statevector::Statevector;
pub use svr::{solve, SolverParams, SvrSolution};
pub use warning::QsvrWarning;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    //! Convenient imports for common use cases.
    pub use crate::backend::ExecutionBackend;
    pub use crate::error::{QsvrError, Result};
    pub use crate::feature_map::{Entanglement, ZZFeatureMap, ZZFeatureMapConfig};
    pub use crate::kernel::QuantumKernel;
    pub use crate::model::{ModelState, Qsvr, QsvrConfig};
    pub use crate::persist::SerializableModel;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
