//! Symmetric eigen-analysis of kernel matrices.
//!
//! Uses the nalgebra `SymmetricEigen` decomposition so that no LAPACK
//! backend is needed.

use nalgebra::DMatrix;
use ndarray::{Array2, ArrayView2};

use crate::error::{QsvrError, Result};

fn to_dmatrix(matrix: ArrayView2<f64>) -> Result<DMatrix<f64>> {
    let (rows, cols) = matrix.dim();
    if rows != cols {
        return Err(QsvrError::dimension_mismatch(rows, cols));
    }
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(QsvrError::numerical("kernel matrix contains non-finite values"));
    }
    Ok(DMatrix::from_fn(rows, cols, |i, j| matrix[[i, j]]))
}

/// Eigenvalues of a symmetric matrix (unordered).
pub fn symmetric_eigenvalues(matrix: ArrayView2<f64>) -> Result<Vec<f64>> {
    let m = to_dmatrix(matrix)?;
    Ok(m.symmetric_eigenvalues().iter().copied().collect())
}

/// Smallest eigenvalue of a symmetric matrix, or `0.0` for an empty matrix.
pub fn min_eigenvalue(matrix: ArrayView2<f64>) -> Result<f64> {
    if matrix.is_empty() {
        return Ok(0.0);
    }
    let eigenvalues = symmetric_eigenvalues(matrix)?;
    Ok(eigenvalues.into_iter().fold(f64::INFINITY, f64::min))
}

/// Project a symmetric matrix onto the PSD cone by clipping negative eigenvalues to zero.
///
/// Returns the projected matrix and the number of eigenvalues that were clipped.
pub fn clip_to_psd(matrix: ArrayView2<f64>) -> Result<(Array2<f64>, usize)> {
    let m = to_dmatrix(matrix)?;
    let mut eigen = m.symmetric_eigen();

    let mut clipped = 0;
    for value in eigen.eigenvalues.iter_mut() {
        if *value < 0.0 {
            *value = 0.0;
            clipped += 1;
        }
    }
    if clipped == 0 {
        return Ok((matrix.to_owned(), 0));
    }

    let recomposed = eigen.recompose();
    let n = matrix.nrows();
    let projected = Array2::from_shape_fn((n, n), |(i, j)| {
        // Average with the transpose to remove rounding asymmetry.
        0.5 * (recomposed[(i, j)] + recomposed[(j, i)])
    });

    Ok((projected, clipped))
}
