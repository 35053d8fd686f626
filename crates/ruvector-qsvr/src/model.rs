//! The `Qsvr` model facade.
//!
//! `Qsvr` ties a [`QuantumKernel`] to the SVR dual solver. The model moves
//! through three states:
//!
//! ```text
//! Unconfigured ──set_kernel──▶ Configured ──fit──▶ Fitted
//! ```
//!
//! A fitted model keeps a snapshot of the kernel it was trained with. Replacing
//! the kernel afterwards does not touch the trained state: `predict` keeps
//! using the snapshot until the next `fit`, and [`Qsvr::needs_refit`] reports
//! the difference.
//!
//! # Usage
//!
//! ```ignore
//! use ruvector_qsvr::{Qsvr, QsvrConfig, QuantumKernel, ZZFeatureMap};
//!
//! let kernel = QuantumKernel::exact(ZZFeatureMap::with_dimension(2)?);
//! let mut model = Qsvr::with_kernel(kernel, QsvrConfig::default())?;
//! model.fit(x_train.view(), y_train.view())?;
//! let r2 = model.score(x_test.view(), y_test.view())?;
//! ```

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use crate::error::{QsvrError, Result};
use crate::kernel::QuantumKernel;
use crate::matrix::KernelMatrixBuilder;
use crate::metrics;
use crate::svr::{self, SolverParams};
use crate::warning::QsvrWarning;

/// Hyperparameters of the regressor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QsvrConfig {
    /// Regularization parameter (box constraint on the dual variables).
    pub c: f64,
    /// Stopping tolerance of the solver.
    pub tol: f64,
    /// Half-width of the epsilon-insensitive tube.
    pub epsilon: f64,
    /// Whether the solver uses the shrinking heuristic.
    pub shrinking: bool,
    /// Solver iteration cap; `None` picks a cap from the sample count.
    pub max_iter: Option<usize>,
    /// Most negative kernel eigenvalue tolerated before fitting fails.
    pub psd_slack: f64,
}

impl Default for QsvrConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            tol: 1e-3,
            epsilon: 0.1,
            shrinking: true,
            max_iter: None,
            psd_slack: 1e-8,
        }
    }
}

impl QsvrConfig {
    /// Tighter stopping tolerance.
    pub fn precise() -> Self {
        Self {
            tol: 1e-5,
            ..Default::default()
        }
    }

    /// Solver parameters derived from this configuration.
    pub fn solver_params(&self) -> SolverParams {
        SolverParams {
            c: self.c,
            epsilon: self.epsilon,
            tol: self.tol,
            shrinking: self.shrinking,
            max_iter: self.max_iter,
            psd_slack: self.psd_slack,
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.solver_params().validate()
    }
}

/// Value passed as the legacy `kernel` argument.
///
/// Only [`KernelArgument::Quantum`] configures a model; everything else is
/// discarded with a [`QsvrWarning::UnsupportedKernelArgument`].
#[derive(Debug, Clone, PartialEq)]
pub enum KernelArgument {
    /// A quantum kernel.
    Quantum(QuantumKernel),
    /// A named classical kernel such as `"rbf"`.
    Named(String),
    /// A bare numeric value.
    Value(f64),
    /// A request for a precomputed kernel matrix.
    Precomputed,
}

impl KernelArgument {
    /// Short description used in warnings.
    pub fn describe(&self) -> String {
        match self {
            Self::Quantum(kernel) => kernel.to_string(),
            Self::Named(name) => format!("'{name}'"),
            Self::Value(value) => format!("value {value}"),
            Self::Precomputed => "'precomputed'".to_string(),
        }
    }
}

impl From<QuantumKernel> for KernelArgument {
    fn from(kernel: QuantumKernel) -> Self {
        Self::Quantum(kernel)
    }
}

impl From<&str> for KernelArgument {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<String> for KernelArgument {
    fn from(name: String) -> Self {
        Self::Named(name)
    }
}

impl From<f64> for KernelArgument {
    fn from(value: f64) -> Self {
        Self::Value(value)
    }
}

impl From<i32> for KernelArgument {
    fn from(value: i32) -> Self {
        Self::Value(f64::from(value))
    }
}

/// Lifecycle state of a [`Qsvr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelState {
    /// No usable kernel.
    Unconfigured,
    /// A kernel is set but the model has not been fitted.
    Configured,
    /// Trained and ready to predict.
    Fitted,
}

impl fmt::Display for ModelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unconfigured => "unconfigured",
            Self::Configured => "configured",
            Self::Fitted => "fitted",
        };
        f.write_str(name)
    }
}

/// Everything `predict` needs after `fit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedState {
    kernel: QuantumKernel,
    params: SolverParams,
    support: Vec<usize>,
    support_vectors: Array2<f64>,
    dual_coef: Array1<f64>,
    intercept: f64,
    n_iter: usize,
    n_samples: usize,
    n_features: usize,
}

impl TrainedState {
    /// Kernel snapshot used for training and prediction.
    pub fn kernel(&self) -> &QuantumKernel {
        &self.kernel
    }

    /// Solver parameters the model was trained with.
    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    /// Training-set indices of the support vectors.
    pub fn support(&self) -> &[usize] {
        &self.support
    }

    /// Support vectors, one per row.
    pub fn support_vectors(&self) -> &Array2<f64> {
        &self.support_vectors
    }

    /// Dual coefficients `a_i - a*_i` of the support vectors.
    pub fn dual_coef(&self) -> &Array1<f64> {
        &self.dual_coef
    }

    /// Constant term of the decision function.
    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Number of support vectors.
    pub fn n_support(&self) -> usize {
        self.support.len()
    }

    /// Solver iterations used during training.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Number of training samples.
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// Number of features per sample.
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.kernel.is_empty() {
            return Err(QsvrError::configuration("trained state has an empty kernel"));
        }
        self.kernel.backend().validate()?;
        if self.kernel.feature_dimension() != Some(self.n_features) {
            return Err(QsvrError::dimension_mismatch(
                self.n_features,
                self.kernel.feature_dimension().unwrap_or(0),
            ));
        }
        if self.support_vectors.nrows() != self.dual_coef.len()
            || self.support.len() != self.dual_coef.len()
        {
            return Err(QsvrError::dimension_mismatch(
                self.dual_coef.len(),
                self.support_vectors.nrows(),
            ));
        }
        if self.support_vectors.ncols() != self.n_features {
            return Err(QsvrError::dimension_mismatch(
                self.n_features,
                self.support_vectors.ncols(),
            ));
        }
        if self.support.iter().any(|&i| i >= self.n_samples) {
            return Err(QsvrError::numerical("support index out of range"));
        }
        let finite = self.intercept.is_finite()
            && self.dual_coef.iter().all(|v| v.is_finite())
            && self.support_vectors.iter().all(|v| v.is_finite());
        if !finite {
            return Err(QsvrError::numerical("trained state contains non-finite values"));
        }
        Ok(())
    }
}

/// Support vector regressor with a fidelity quantum kernel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Qsvr {
    config: QsvrConfig,
    kernel: QuantumKernel,
    trained: Option<TrainedState>,
    #[serde(skip)]
    warnings: Vec<QsvrWarning>,
}

impl Default for Qsvr {
    fn default() -> Self {
        Self {
            config: QsvrConfig::default(),
            kernel: QuantumKernel::default(),
            trained: None,
            warnings: Vec::new(),
        }
    }
}

impl Qsvr {
    /// Create an unconfigured model.
    pub fn new(config: QsvrConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Default::default()
        })
    }

    /// Create a model with a quantum kernel.
    pub fn with_kernel(kernel: QuantumKernel, config: QsvrConfig) -> Result<Self> {
        let mut model = Self::new(config)?;
        model.kernel = kernel;
        Ok(model)
    }

    /// Create a model from a legacy `kernel` argument.
    ///
    /// Anything other than a quantum kernel is discarded with a warning and
    /// the model starts unconfigured.
    pub fn with_kernel_argument(
        argument: impl Into<KernelArgument>,
        config: QsvrConfig,
    ) -> Result<Self> {
        match argument.into() {
            KernelArgument::Quantum(kernel) => Self::with_kernel(kernel, config),
            other => {
                let mut model = Self::new(config)?;
                model.push_warning(QsvrWarning::UnsupportedKernelArgument {
                    argument: other.describe(),
                });
                Ok(model)
            }
        }
    }

    fn push_warning(&mut self, warning: QsvrWarning) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }

    /// Current configuration.
    pub fn config(&self) -> &QsvrConfig {
        &self.config
    }

    /// Replace the configuration. Takes effect at the next `fit`.
    pub fn set_config(&mut self, config: QsvrConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Current kernel (not necessarily the one the model was fitted with).
    pub fn kernel(&self) -> &QuantumKernel {
        &self.kernel
    }

    /// Replace the kernel.
    ///
    /// On a fitted model the trained state keeps its kernel snapshot and a
    /// [`QsvrWarning::KernelChangedAfterFit`] is recorded.
    pub fn set_kernel(&mut self, kernel: QuantumKernel) {
        let changed = self
            .trained
            .as_ref()
            .is_some_and(|trained| trained.kernel != kernel);
        self.kernel = kernel;
        if changed {
            self.push_warning(QsvrWarning::KernelChangedAfterFit);
        }
    }

    /// Lifecycle state.
    pub fn state(&self) -> ModelState {
        if self.trained.is_some() {
            ModelState::Fitted
        } else if self.kernel.is_empty() {
            ModelState::Unconfigured
        } else {
            ModelState::Configured
        }
    }

    /// Whether the model has been fitted.
    pub fn is_fitted(&self) -> bool {
        self.trained.is_some()
    }

    /// Whether the kernel or configuration changed since the last `fit`.
    pub fn needs_refit(&self) -> bool {
        self.trained.as_ref().is_some_and(|trained| {
            trained.kernel != self.kernel || trained.params != self.config.solver_params()
        })
    }

    /// Warnings recorded so far.
    pub fn warnings(&self) -> &[QsvrWarning] {
        &self.warnings
    }

    /// Drain the recorded warnings.
    pub fn take_warnings(&mut self) -> Vec<QsvrWarning> {
        std::mem::take(&mut self.warnings)
    }

    /// Trained state, or [`QsvrError::NotFitted`].
    pub fn trained(&self) -> Result<&TrainedState> {
        self.trained.as_ref().ok_or(QsvrError::NotFitted)
    }

    /// Fit the regressor on `x` (one sample per row) and targets `y`.
    ///
    /// On error the model keeps its previous state.
    pub fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        if self.kernel.is_empty() {
            return Err(QsvrError::configuration(
                "no quantum kernel set; call set_kernel() before fit()",
            ));
        }
        self.config.validate()?;

        let n_samples = x.nrows();
        if n_samples == 0 {
            return Err(QsvrError::EmptyInput("no training samples".to_string()));
        }
        if y.len() != n_samples {
            return Err(QsvrError::dimension_mismatch(n_samples, y.len()));
        }

        info!(
            "Fitting QSVR on {} samples of dimension {}",
            n_samples,
            x.ncols()
        );

        let k_matrix = KernelMatrixBuilder::new(Some(&self.kernel)).build(x)?;
        let params = self.config.solver_params();
        let solution = svr::solve(k_matrix.view(), y, &params)?;

        debug!(
            n_support = solution.support_indices.len(),
            n_iter = solution.n_iter,
            intercept = solution.intercept,
            "solver finished"
        );

        let support = solution.support_indices;
        let support_vectors =
            Array2::from_shape_fn((support.len(), x.ncols()), |(r, c)| x[[support[r], c]]);
        self.trained = Some(TrainedState {
            kernel: self.kernel.clone(),
            params,
            support,
            support_vectors,
            dual_coef: Array1::from(solution.dual_coef),
            intercept: solution.intercept,
            n_iter: solution.n_iter,
            n_samples,
            n_features: x.ncols(),
        });

        Ok(())
    }

    /// Predict targets for `x` with the fitted kernel snapshot.
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        let trained = self.trained()?;
        if x.nrows() == 0 {
            return Err(QsvrError::EmptyInput("no samples to predict".to_string()));
        }
        if x.ncols() != trained.n_features {
            return Err(QsvrError::dimension_mismatch(trained.n_features, x.ncols()));
        }

        let k_cross = KernelMatrixBuilder::new(Some(&trained.kernel))
            .build_cross(x, trained.support_vectors.view())?;

        Ok(k_cross.dot(&trained.dual_coef) + trained.intercept)
    }

    /// Coefficient of determination R² of `predict(x)` against `y`.
    pub fn score(&self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<f64> {
        self.trained()?;
        if y.len() != x.nrows() {
            return Err(QsvrError::dimension_mismatch(x.nrows(), y.len()));
        }
        let predictions = self.predict(x)?;
        metrics::r2_score(y, predictions.view())
    }

    pub(crate) fn check_consistency(&self) -> Result<()> {
        self.config.validate()?;
        self.kernel.backend().validate()?;
        if let Some(trained) = &self.trained {
            trained.validate()?;
        }
        Ok(())
    }
}

impl fmt::Display for Qsvr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Qsvr(C={}, epsilon={}, tol={}, shrinking={}, kernel={}, state={}",
            self.config.c,
            self.config.epsilon,
            self.config.tol,
            self.config.shrinking,
            self.kernel,
            self.state()
        )?;
        if let Some(trained) = &self.trained {
            write!(f, ", n_support={}", trained.n_support())?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_map::ZZFeatureMap;
    use ndarray::array;

    fn zz_kernel() -> QuantumKernel {
        QuantumKernel::exact(ZZFeatureMap::with_dimension(2).unwrap())
    }

    fn training_data() -> (Array2<f64>, Array1<f64>) {
        (
            array![[0.0, 0.0], [0.1, 0.1], [0.4, 0.4], [1.0, 1.0]],
            array![0.0, 0.1, 0.4, 1.0],
        )
    }

    #[test]
    fn test_config_validation() {
        assert!(QsvrConfig::default().validate().is_ok());
        assert!(QsvrConfig::precise().validate().is_ok());

        let config = QsvrConfig {
            c: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            Qsvr::new(config),
            Err(QsvrError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_state_transitions() {
        let mut model = Qsvr::default();
        assert_eq!(model.state(), ModelState::Unconfigured);

        model.set_kernel(zz_kernel());
        assert_eq!(model.state(), ModelState::Configured);
        assert!(model.warnings().is_empty());

        let (x, y) = training_data();
        model.fit(x.view(), y.view()).unwrap();
        assert_eq!(model.state(), ModelState::Fitted);
        assert!(!model.needs_refit());
    }

    #[test]
    fn test_fit_without_kernel() {
        let (x, y) = training_data();
        let mut model = Qsvr::default();
        assert!(matches!(
            model.fit(x.view(), y.view()),
            Err(QsvrError::Configuration(_))
        ));
        assert_eq!(model.state(), ModelState::Unconfigured);
    }

    #[test]
    fn test_predict_before_fit() {
        let model = Qsvr::with_kernel(zz_kernel(), QsvrConfig::default()).unwrap();
        let x = array![[0.5, 0.5]];
        assert!(matches!(model.predict(x.view()), Err(QsvrError::NotFitted)));
        assert!(matches!(
            model.score(x.view(), array![0.5].view()),
            Err(QsvrError::NotFitted)
        ));
    }

    #[test]
    fn test_fit_shape_errors() {
        let mut model = Qsvr::with_kernel(zz_kernel(), QsvrConfig::default()).unwrap();
        let (x, _) = training_data();
        assert!(matches!(
            model.fit(x.view(), array![0.0, 1.0].view()),
            Err(QsvrError::DimensionMismatch { expected: 4, actual: 2 })
        ));
        let empty = Array2::<f64>::zeros((0, 2));
        assert!(matches!(
            model.fit(empty.view(), Array1::<f64>::zeros(0).view()),
            Err(QsvrError::EmptyInput(_))
        ));
        let wide = array![[0.0, 0.0, 0.0]];
        assert!(matches!(
            model.fit(wide.view(), array![1.0].view()),
            Err(QsvrError::DimensionMismatch { expected: 2, actual: 3 })
        ));
        assert!(!model.is_fitted());
    }

    #[test]
    fn test_predict_matches_reference() {
        let (x, y) = training_data();
        let mut model = Qsvr::with_kernel(zz_kernel(), QsvrConfig::default()).unwrap();
        model.fit(x.view(), y.view()).unwrap();

        let prediction = model.predict(array![[0.5, 0.5]].view()).unwrap();
        assert!(
            (prediction[0] - 0.73795).abs() < 1e-3,
            "prediction = {}",
            prediction[0]
        );

        let trained = model.trained().unwrap();
        assert_eq!(trained.n_features(), 2);
        assert_eq!(trained.n_samples(), 4);
        assert_eq!(trained.support_vectors().nrows(), trained.n_support());
        for &coef in trained.dual_coef() {
            assert!(coef.abs() <= 1.0 + 1e-12);
        }

        assert!(matches!(
            model.predict(array![[0.5, 0.5, 0.5]].view()),
            Err(QsvrError::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_kernel_change_after_fit_keeps_snapshot() {
        let (x, y) = training_data();
        let mut model = Qsvr::with_kernel(zz_kernel(), QsvrConfig::default()).unwrap();
        model.fit(x.view(), y.view()).unwrap();
        let before = model.predict(x.view()).unwrap();

        let other = QuantumKernel::exact(
            ZZFeatureMap::new(crate::feature_map::ZZFeatureMapConfig {
                feature_dimension: 2,
                reps: 1,
                ..Default::default()
            })
            .unwrap(),
        );
        model.set_kernel(other);

        assert!(model.needs_refit());
        assert_eq!(model.warnings(), &[QsvrWarning::KernelChangedAfterFit]);
        assert_eq!(model.predict(x.view()).unwrap(), before);

        model.fit(x.view(), y.view()).unwrap();
        assert!(!model.needs_refit());
    }

    #[test]
    fn test_setting_same_kernel_is_silent() {
        let (x, y) = training_data();
        let mut model = Qsvr::with_kernel(zz_kernel(), QsvrConfig::default()).unwrap();
        model.fit(x.view(), y.view()).unwrap();
        model.set_kernel(zz_kernel());
        assert!(model.warnings().is_empty());
        assert!(!model.needs_refit());
    }

    #[test]
    fn test_config_change_needs_refit() {
        let (x, y) = training_data();
        let mut model = Qsvr::with_kernel(zz_kernel(), QsvrConfig::default()).unwrap();
        model.fit(x.view(), y.view()).unwrap();
        model.set_config(QsvrConfig::precise()).unwrap();
        assert!(model.needs_refit());
    }

    #[test]
    fn test_kernel_argument() {
        let model = Qsvr::with_kernel_argument("rbf", QsvrConfig::default()).unwrap();
        assert_eq!(model.state(), ModelState::Unconfigured);
        assert_eq!(
            model.warnings(),
            &[QsvrWarning::UnsupportedKernelArgument {
                argument: "'rbf'".to_string()
            }]
        );

        let mut model = Qsvr::with_kernel_argument(1, QsvrConfig::default()).unwrap();
        assert_eq!(model.take_warnings().len(), 1);
        assert!(model.warnings().is_empty());

        let model = Qsvr::with_kernel_argument(zz_kernel(), QsvrConfig::default()).unwrap();
        assert_eq!(model.state(), ModelState::Configured);
        assert!(model.warnings().is_empty());

        assert_eq!(KernelArgument::Precomputed.describe(), "'precomputed'");
    }

    #[test]
    fn test_display() {
        let text = Qsvr::default().to_string();
        assert!(text.starts_with("Qsvr("));
        assert!(text.contains("state=unconfigured"));

        let (x, y) = training_data();
        let mut model = Qsvr::with_kernel(zz_kernel(), QsvrConfig::default()).unwrap();
        model.fit(x.view(), y.view()).unwrap();
        let text = model.to_string();
        assert!(text.contains("state=fitted"));
        assert!(text.contains("n_support="));
    }
}
