//! Epsilon-insensitive support vector regression on a precomputed kernel.
//!
//! The dual is solved in the 2l-variable form
//!
//! ```text
//! min  1/2 (a - a*)^T K (a - a*) + eps * sum(a + a*) - y^T (a - a*)
//! s.t. sum(a - a*) = 0,   0 <= a_i, a*_i <= C
//! ```
//!
//! with sequential minimal optimization: second-order working set selection
//! (Fan, Chen & Lin, 2005) and the optional shrinking heuristic. Variable `t`
//! of the 2l-variable problem maps to sample `t mod l` with sign `+1` for
//! `t < l` and `-1` otherwise.
//!
//! The solver is deterministic: identical inputs give identical solutions.

use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{QsvrError, Result};
use crate::linalg;

/// Floor for non-positive curvature along a working pair.
const TAU: f64 = 1e-12;

/// Hyperparameters for the SVR dual solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverParams {
    /// Box constraint on every dual variable.
    pub c: f64,
    /// Half-width of the epsilon-insensitive tube.
    pub epsilon: f64,
    /// Stopping tolerance on the maximal KKT violation.
    pub tol: f64,
    /// Whether to use the shrinking heuristic.
    pub shrinking: bool,
    /// Iteration cap; `None` uses `max(10_000_000, 100 * 2l)`.
    pub max_iter: Option<usize>,
    /// Most negative kernel eigenvalue tolerated before the matrix is rejected.
    pub psd_slack: f64,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            epsilon: 0.1,
            tol: 1e-3,
            shrinking: true,
            max_iter: None,
            psd_slack: 1e-8,
        }
    }
}

impl SolverParams {
    /// Validate the solver parameters.
    pub fn validate(&self) -> Result<()> {
        if !(self.c.is_finite() && self.c > 0.0) {
            return Err(QsvrError::invalid_parameter("c", "must be positive and finite"));
        }
        if !(self.epsilon.is_finite() && self.epsilon >= 0.0) {
            return Err(QsvrError::invalid_parameter(
                "epsilon",
                "must be non-negative and finite",
            ));
        }
        if !(self.tol.is_finite() && self.tol > 0.0) {
            return Err(QsvrError::invalid_parameter("tol", "must be positive and finite"));
        }
        if self.max_iter == Some(0) {
            return Err(QsvrError::invalid_parameter("max_iter", "must be at least 1"));
        }
        if !(self.psd_slack.is_finite() && self.psd_slack >= 0.0) {
            return Err(QsvrError::invalid_parameter(
                "psd_slack",
                "must be non-negative and finite",
            ));
        }
        Ok(())
    }
}

/// Result of solving the SVR dual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvrSolution {
    /// Indices of training samples with a non-zero dual coefficient.
    pub support_indices: Vec<usize>,
    /// `a_i - a*_i` for each support index, in the same order.
    pub dual_coef: Vec<f64>,
    /// Constant term of the decision function.
    pub intercept: f64,
    /// SMO iterations performed.
    pub n_iter: usize,
}

impl SvrSolution {
    /// Decision value for one row of kernel values against the support vectors.
    pub fn decision(&self, kernel_row: ArrayView1<f64>) -> f64 {
        self.dual_coef
            .iter()
            .zip(kernel_row.iter())
            .map(|(coef, k)| coef * k)
            .sum::<f64>()
            + self.intercept
    }
}

/// Solve the epsilon-SVR dual for a precomputed kernel matrix and targets.
///
/// # Errors
///
/// - [`QsvrError::InvalidParameter`] for invalid `params`.
/// - [`QsvrError::EmptyInput`] when there are no samples.
/// - [`QsvrError::DimensionMismatch`] when `kernel` is not `l × l` for `l = y.len()`.
/// - [`QsvrError::Numerical`] for non-finite inputs, a kernel whose smallest
///   eigenvalue is below `-psd_slack`, or no convergence within `max_iter`.
pub fn solve(
    kernel: ArrayView2<f64>,
    y: ArrayView1<f64>,
    params: &SolverParams,
) -> Result<SvrSolution> {
    params.validate()?;

    let l = y.len();
    if l == 0 {
        return Err(QsvrError::EmptyInput("no training samples".to_string()));
    }
    if kernel.nrows() != kernel.ncols() {
        return Err(QsvrError::dimension_mismatch(kernel.nrows(), kernel.ncols()));
    }
    if kernel.nrows() != l {
        return Err(QsvrError::dimension_mismatch(l, kernel.nrows()));
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(QsvrError::numerical("targets contain non-finite values"));
    }

    let min_eig = linalg::min_eigenvalue(kernel)?;
    if min_eig < -params.psd_slack {
        return Err(QsvrError::numerical(format!(
            "kernel matrix is not positive semi-definite (smallest eigenvalue {min_eig:.3e}, slack {:.3e})",
            params.psd_slack
        )));
    }

    let n = 2 * l;
    let max_iter = params
        .max_iter
        .unwrap_or_else(|| 10_000_000usize.max(n.saturating_mul(100)));

    let mut solver = SmoSolver::new(kernel, y, params);
    let n_iter = solver.run(max_iter)?;
    let rho = solver.rho();
    let alpha = solver.into_alpha();

    let mut support_indices = Vec::new();
    let mut dual_coef = Vec::new();
    for i in 0..l {
        let coef = alpha[i] - alpha[i + l];
        if coef != 0.0 {
            support_indices.push(i);
            dual_coef.push(coef);
        }
    }

    debug!(
        n_samples = l,
        n_support = support_indices.len(),
        n_iter,
        rho,
        "SVR dual solved"
    );

    Ok(SvrSolution {
        support_indices,
        dual_coef,
        intercept: -rho,
        n_iter,
    })
}

struct SmoSolver<'a> {
    kernel: ArrayView2<'a, f64>,
    n_samples: usize,
    c: f64,
    tol: f64,
    shrinking: bool,
    active_size: usize,
    unshrink: bool,
    /// Sign of each variable (+1 for a, -1 for a*).
    sign: Vec<f64>,
    /// Original variable index at each position (positions move under shrinking).
    index: Vec<usize>,
    alpha: Vec<f64>,
    grad: Vec<f64>,
    /// Gradient contribution of variables at the upper bound.
    grad_bar: Vec<f64>,
    p: Vec<f64>,
}

impl<'a> SmoSolver<'a> {
    fn new(kernel: ArrayView2<'a, f64>, y: ArrayView1<f64>, params: &SolverParams) -> Self {
        let l = y.len();
        let n = 2 * l;

        let mut p = Vec::with_capacity(n);
        p.extend(y.iter().map(|&yi| params.epsilon - yi));
        p.extend(y.iter().map(|&yi| params.epsilon + yi));

        let mut sign = vec![1.0; l];
        sign.extend(std::iter::repeat(-1.0).take(l));

        Self {
            kernel,
            n_samples: l,
            c: params.c,
            tol: params.tol,
            shrinking: params.shrinking,
            active_size: n,
            unshrink: false,
            sign,
            index: (0..n).collect(),
            alpha: vec![0.0; n],
            grad: p.clone(),
            grad_bar: vec![0.0; n],
            p,
        }
    }

    fn len(&self) -> usize {
        self.alpha.len()
    }

    /// Q entries are held in single precision, the diagonal in double.
    #[inline]
    fn q(&self, i: usize, j: usize) -> f64 {
        let (si, sj) = (self.index[i] % self.n_samples, self.index[j] % self.n_samples);
        f64::from((self.sign[i] * self.sign[j] * self.kernel[[si, sj]]) as f32)
    }

    #[inline]
    fn qd(&self, i: usize) -> f64 {
        let s = self.index[i] % self.n_samples;
        self.kernel[[s, s]]
    }

    #[inline]
    fn is_upper_bound(&self, i: usize) -> bool {
        self.alpha[i] >= self.c
    }

    #[inline]
    fn is_lower_bound(&self, i: usize) -> bool {
        self.alpha[i] <= 0.0
    }

    #[inline]
    fn is_free(&self, i: usize) -> bool {
        !self.is_upper_bound(i) && !self.is_lower_bound(i)
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.sign.swap(i, j);
        self.index.swap(i, j);
        self.alpha.swap(i, j);
        self.grad.swap(i, j);
        self.grad_bar.swap(i, j);
        self.p.swap(i, j);
    }

    fn reconstruct_gradient(&mut self) {
        let n = self.len();
        if self.active_size == n {
            return;
        }

        for j in self.active_size..n {
            self.grad[j] = self.grad_bar[j] + self.p[j];
        }
        for i in 0..self.active_size {
            if self.is_free(i) {
                let alpha_i = self.alpha[i];
                for j in self.active_size..n {
                    self.grad[j] += alpha_i * self.q(i, j);
                }
            }
        }
    }

    /// Second-order working set selection. `None` means the tolerance is met.
    fn select_working_set(&self) -> Option<(usize, usize)> {
        let mut gmax = f64::NEG_INFINITY;
        let mut gmax2 = f64::NEG_INFINITY;
        let mut gmax_idx = None;
        let mut gmin_idx = None;
        let mut obj_diff_min = f64::INFINITY;

        for t in 0..self.active_size {
            if self.sign[t] > 0.0 {
                if !self.is_upper_bound(t) && -self.grad[t] >= gmax {
                    gmax = -self.grad[t];
                    gmax_idx = Some(t);
                }
            } else if !self.is_lower_bound(t) && self.grad[t] >= gmax {
                gmax = self.grad[t];
                gmax_idx = Some(t);
            }
        }

        let i = gmax_idx?;
        let qd_i = self.qd(i);

        for j in 0..self.active_size {
            let (grad_diff, quad_coef) = if self.sign[j] > 0.0 {
                if self.is_lower_bound(j) {
                    continue;
                }
                if self.grad[j] >= gmax2 {
                    gmax2 = self.grad[j];
                }
                (
                    gmax + self.grad[j],
                    qd_i + self.qd(j) - 2.0 * self.sign[i] * self.q(i, j),
                )
            } else {
                if self.is_upper_bound(j) {
                    continue;
                }
                if -self.grad[j] >= gmax2 {
                    gmax2 = -self.grad[j];
                }
                (
                    gmax - self.grad[j],
                    qd_i + self.qd(j) + 2.0 * self.sign[i] * self.q(i, j),
                )
            };

            if grad_diff > 0.0 {
                let curvature = if quad_coef > 0.0 { quad_coef } else { TAU };
                let obj_diff = -(grad_diff * grad_diff) / curvature;
                if obj_diff <= obj_diff_min {
                    gmin_idx = Some(j);
                    obj_diff_min = obj_diff;
                }
            }
        }

        if gmax + gmax2 < self.tol {
            return None;
        }
        gmin_idx.map(|j| (i, j))
    }

    fn be_shrunk(&self, i: usize, gmax1: f64, gmax2: f64) -> bool {
        if self.is_upper_bound(i) {
            if self.sign[i] > 0.0 {
                -self.grad[i] > gmax1
            } else {
                -self.grad[i] > gmax2
            }
        } else if self.is_lower_bound(i) {
            if self.sign[i] > 0.0 {
                self.grad[i] > gmax2
            } else {
                self.grad[i] > gmax1
            }
        } else {
            false
        }
    }

    fn do_shrinking(&mut self) {
        let mut gmax1 = f64::NEG_INFINITY;
        let mut gmax2 = f64::NEG_INFINITY;

        for i in 0..self.active_size {
            let g = self.grad[i];
            if self.sign[i] > 0.0 {
                if !self.is_upper_bound(i) {
                    gmax1 = gmax1.max(-g);
                }
                if !self.is_lower_bound(i) {
                    gmax2 = gmax2.max(g);
                }
            } else {
                if !self.is_upper_bound(i) {
                    gmax2 = gmax2.max(-g);
                }
                if !self.is_lower_bound(i) {
                    gmax1 = gmax1.max(g);
                }
            }
        }

        if !self.unshrink && gmax1 + gmax2 <= self.tol * 10.0 {
            self.unshrink = true;
            self.reconstruct_gradient();
            self.active_size = self.len();
        }

        let mut i = 0;
        while i < self.active_size {
            if self.be_shrunk(i, gmax1, gmax2) {
                self.active_size -= 1;
                while self.active_size > i {
                    if !self.be_shrunk(self.active_size, gmax1, gmax2) {
                        self.swap(i, self.active_size);
                        break;
                    }
                    self.active_size -= 1;
                }
            }
            i += 1;
        }
    }

    /// Analytic update of the pair `(i, j)` followed by the gradient update.
    fn take_step(&mut self, i: usize, j: usize) {
        let c = self.c;
        let q_ij = self.q(i, j);
        let old_alpha_i = self.alpha[i];
        let old_alpha_j = self.alpha[j];
        let was_upper_i = self.is_upper_bound(i);
        let was_upper_j = self.is_upper_bound(j);

        if self.sign[i] != self.sign[j] {
            let mut quad_coef = self.qd(i) + self.qd(j) + 2.0 * q_ij;
            if quad_coef <= 0.0 {
                quad_coef = TAU;
            }
            let delta = (-self.grad[i] - self.grad[j]) / quad_coef;
            let diff = self.alpha[i] - self.alpha[j];
            self.alpha[i] += delta;
            self.alpha[j] += delta;

            if diff > 0.0 {
                if self.alpha[j] < 0.0 {
                    self.alpha[j] = 0.0;
                    self.alpha[i] = diff;
                }
            } else if self.alpha[i] < 0.0 {
                self.alpha[i] = 0.0;
                self.alpha[j] = -diff;
            }
            if diff > 0.0 {
                if self.alpha[i] > c {
                    self.alpha[i] = c;
                    self.alpha[j] = c - diff;
                }
            } else if self.alpha[j] > c {
                self.alpha[j] = c;
                self.alpha[i] = c + diff;
            }
        } else {
            let mut quad_coef = self.qd(i) + self.qd(j) - 2.0 * q_ij;
            if quad_coef <= 0.0 {
                quad_coef = TAU;
            }
            let delta = (self.grad[i] - self.grad[j]) / quad_coef;
            let sum = self.alpha[i] + self.alpha[j];
            self.alpha[i] -= delta;
            self.alpha[j] += delta;

            if sum > c {
                if self.alpha[i] > c {
                    self.alpha[i] = c;
                    self.alpha[j] = sum - c;
                }
            } else if self.alpha[j] < 0.0 {
                self.alpha[j] = 0.0;
                self.alpha[i] = sum;
            }
            if sum > c {
                if self.alpha[j] > c {
                    self.alpha[j] = c;
                    self.alpha[i] = sum - c;
                }
            } else if self.alpha[i] < 0.0 {
                self.alpha[i] = 0.0;
                self.alpha[j] = sum;
            }
        }

        let delta_i = self.alpha[i] - old_alpha_i;
        let delta_j = self.alpha[j] - old_alpha_j;
        for k in 0..self.active_size {
            self.grad[k] += self.q(i, k) * delta_i + self.q(j, k) * delta_j;
        }

        let n = self.len();
        for (var, was_upper) in [(i, was_upper_i), (j, was_upper_j)] {
            if was_upper != self.is_upper_bound(var) {
                let scale = if was_upper { -c } else { c };
                for k in 0..n {
                    self.grad_bar[k] += scale * self.q(var, k);
                }
            }
        }
    }

    fn run(&mut self, max_iter: usize) -> Result<usize> {
        let n = self.len();
        let shrink_period = n.min(1000);
        let mut counter = shrink_period + 1;
        let mut iter = 0;

        while iter < max_iter {
            counter -= 1;
            if counter == 0 {
                counter = shrink_period;
                if self.shrinking {
                    self.do_shrinking();
                }
            }

            let (i, j) = match self.select_working_set() {
                Some(pair) => pair,
                None => {
                    self.reconstruct_gradient();
                    self.active_size = n;
                    match self.select_working_set() {
                        Some(pair) => {
                            counter = 1;
                            pair
                        }
                        None => return Ok(iter),
                    }
                }
            };

            iter += 1;
            self.take_step(i, j);
        }

        Err(QsvrError::numerical(format!(
            "SVR solver did not converge within {max_iter} iterations (tol {:.1e})",
            self.tol
        )))
    }

    /// Offset `rho` of the decision function `sum coef_i K(x_i, x) - rho`.
    fn rho(&self) -> f64 {
        let mut upper = f64::INFINITY;
        let mut lower = f64::NEG_INFINITY;
        let mut n_free = 0usize;
        let mut sum_free = 0.0;

        for i in 0..self.active_size {
            let y_grad = self.sign[i] * self.grad[i];
            if self.is_upper_bound(i) {
                if self.sign[i] < 0.0 {
                    upper = upper.min(y_grad);
                } else {
                    lower = lower.max(y_grad);
                }
            } else if self.is_lower_bound(i) {
                if self.sign[i] > 0.0 {
                    upper = upper.min(y_grad);
                } else {
                    lower = lower.max(y_grad);
                }
            } else {
                n_free += 1;
                sum_free += y_grad;
            }
        }

        if n_free > 0 {
            sum_free / n_free as f64
        } else {
            (upper + lower) / 2.0
        }
    }

    /// Dual variables in their original order.
    fn into_alpha(self) -> Vec<f64> {
        let mut alpha = vec![0.0; self.alpha.len()];
        for (pos, &orig) in self.index.iter().enumerate() {
            alpha[orig] = self.alpha[pos];
        }
        alpha
    }
}
