//! Kernel matrix construction.
//!
//! Every row is encoded once; pair values are then computed from the cached
//! statevectors. For a single data set only the strict upper triangle is
//! evaluated and mirrored, and the diagonal is fixed at 1. Cross entries for
//! bitwise-identical rows are 1 on every backend.
//!
//! With the `parallel` feature the pair evaluations run on rayon. Each value
//! is written to its own `(i, j)` slot, so the matrix does not depend on
//! thread scheduling.

use ndarray::{Array2, ArrayView2};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::debug;

use crate::error::{QsvrError, Result};
use crate::kernel::QuantumKernel;
use crate::linalg;
use crate::statevector::Statevector;

/// Builds train×train and train×test kernel matrices from a [`QuantumKernel`].
#[derive(Debug, Clone, Copy)]
pub struct KernelMatrixBuilder<'a> {
    kernel: Option<&'a QuantumKernel>,
}

impl<'a> KernelMatrixBuilder<'a> {
    /// Create a builder. A `None` kernel makes every build fail with a configuration error.
    pub fn new(kernel: Option<&'a QuantumKernel>) -> Self {
        Self { kernel }
    }

    fn kernel(&self) -> Result<&'a QuantumKernel> {
        match self.kernel {
            Some(kernel) if !kernel.is_empty() => Ok(kernel),
            Some(_) => Err(QsvrError::configuration(
                "quantum kernel has no feature map; cannot build a kernel matrix",
            )),
            None => Err(QsvrError::configuration(
                "no quantum kernel set; cannot build a kernel matrix",
            )),
        }
    }

    fn encode_rows(kernel: &QuantumKernel, data: ArrayView2<f64>) -> Result<Vec<Statevector>> {
        let map = kernel.require_feature_map()?;
        if data.ncols() != map.feature_dimension() {
            return Err(QsvrError::dimension_mismatch(
                map.feature_dimension(),
                data.ncols(),
            ));
        }
        data.rows().into_iter().map(|row| map.encode(row)).collect()
    }

    /// Symmetric kernel matrix for a single data set.
    pub fn build(&self, data: ArrayView2<f64>) -> Result<Array2<f64>> {
        let kernel = self.kernel()?;
        let n = data.nrows();
        let phi = Self::encode_rows(kernel, data)?;

        let pairs: Vec<(usize, usize)> = (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .collect();
        let values = evaluate_pairs(&pairs, |i, j| {
            kernel.value_from_states(&phi[i], &phi[j], data.row(i), data.row(j))
        })?;

        let mut k_matrix = Array2::eye(n);
        for (&(i, j), &value) in pairs.iter().zip(values.iter()) {
            k_matrix[[i, j]] = value;
            k_matrix[[j, i]] = value;
        }

        debug!(
            n_samples = n,
            n_evaluations = pairs.len(),
            "built symmetric kernel matrix"
        );

        if kernel.enforce_psd() && n > 0 {
            let (projected, clipped) = linalg::clip_to_psd(k_matrix.view())?;
            if clipped > 0 {
                debug!(clipped, "clipped negative kernel matrix eigenvalues to zero");
                k_matrix = projected;
            }
        }

        Ok(k_matrix)
    }

    /// Rectangular kernel matrix `K[i, j] = k(X[i], Y[j])`.
    pub fn build_cross(
        &self,
        x_data: ArrayView2<f64>,
        y_data: ArrayView2<f64>,
    ) -> Result<Array2<f64>> {
        let kernel = self.kernel()?;
        let (n_x, n_y) = (x_data.nrows(), y_data.nrows());
        let phi_x = Self::encode_rows(kernel, x_data)?;
        let phi_y = Self::encode_rows(kernel, y_data)?;

        let pairs: Vec<(usize, usize)> = (0..n_x)
            .flat_map(|i| (0..n_y).map(move |j| (i, j)))
            .collect();
        let values = evaluate_pairs(&pairs, |i, j| {
            kernel.value_from_states(&phi_x[i], &phi_y[j], x_data.row(i), y_data.row(j))
        })?;

        debug!(n_x, n_y, "built cross kernel matrix");

        Array2::from_shape_vec((n_x, n_y), values)
            .map_err(|e| QsvrError::numerical(format!("kernel matrix shape error: {e}")))
    }
}

#[cfg(feature = "parallel")]
fn evaluate_pairs<F>(pairs: &[(usize, usize)], f: F) -> Result<Vec<f64>>
where
    F: Fn(usize, usize) -> Result<f64> + Sync,
{
    pairs.par_iter().map(|&(i, j)| f(i, j)).collect()
}

#[cfg(not(feature = "parallel"))]
fn evaluate_pairs<F>(pairs: &[(usize, usize)], f: F) -> Result<Vec<f64>>
where
    F: Fn(usize, usize) -> Result<f64>,
{
    pairs.iter().map(|&(i, j)| f(i, j)).collect()
}
