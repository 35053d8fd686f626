//! Second-order Pauli-Z evolution feature map (ZZ feature map).
//!
//! Each repetition applies
//!
//! ```text
//! H^{⊗n} · Π_i P(alpha · x_i) · Π_{(i,j) ∈ E} exp-ZZ(alpha · (π - x_i)(π - x_j))
//! ```
//!
//! to the register, starting from `|0...0>`. The entangling set `E` is chosen
//! by [`Entanglement`]. All phase terms are diagonal, so their order within a
//! repetition does not change the state.
//!
//! # References
//!
//! - Havlicek et al. (2019). "Supervised learning with quantum-enhanced feature spaces"

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{QsvrError, Result};
use crate::statevector::{Statevector, MAX_QUBITS};

/// Which qubit pairs receive a ZZ interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Entanglement {
    /// Every pair `(i, j)` with `i < j`.
    #[default]
    Full,
    /// Neighbouring pairs `(i, i + 1)`.
    Linear,
    /// Neighbouring pairs plus `(n - 1, 0)` when `n > 2`.
    Circular,
}

impl Entanglement {
    /// Qubit pairs for a register of `n_qubits`.
    pub fn pairs(&self, n_qubits: usize) -> Vec<(usize, usize)> {
        match self {
            Self::Full => (0..n_qubits)
                .flat_map(|i| ((i + 1)..n_qubits).map(move |j| (i, j)))
                .collect(),
            Self::Linear => (0..n_qubits.saturating_sub(1)).map(|i| (i, i + 1)).collect(),
            Self::Circular => {
                let mut pairs: Vec<_> =
                    (0..n_qubits.saturating_sub(1)).map(|i| (i, i + 1)).collect();
                if n_qubits > 2 {
                    pairs.push((n_qubits - 1, 0));
                }
                pairs
            }
        }
    }
}

/// Configuration for the ZZ feature map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZZFeatureMapConfig {
    /// Number of input features, one qubit per feature.
    pub feature_dimension: usize,

    /// Number of repetitions of the encoding block.
    pub reps: usize,

    /// Pairs that receive ZZ interactions.
    pub entanglement: Entanglement,

    /// Prefactor applied to every rotation angle.
    pub alpha: f64,
}

impl Default for ZZFeatureMapConfig {
    fn default() -> Self {
        Self {
            feature_dimension: 2,
            reps: 2,
            entanglement: Entanglement::Full,
            alpha: 2.0,
        }
    }
}

impl ZZFeatureMapConfig {
    /// Default configuration for `feature_dimension` features.
    pub fn with_dimension(feature_dimension: usize) -> Self {
        Self {
            feature_dimension,
            ..Default::default()
        }
    }

    /// Validate the configuration parameters.
    pub fn validate(&self) -> Result<()> {
        if self.feature_dimension == 0 || self.feature_dimension > MAX_QUBITS {
            return Err(QsvrError::invalid_parameter(
                "feature_dimension",
                format!("must be between 1 and {MAX_QUBITS}"),
            ));
        }
        if self.reps == 0 {
            return Err(QsvrError::invalid_parameter("reps", "must be at least 1"));
        }
        if !self.alpha.is_finite() {
            return Err(QsvrError::invalid_parameter("alpha", "must be finite"));
        }
        Ok(())
    }
}

/// A validated ZZ feature map that encodes feature vectors into statevectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ZZFeatureMapConfig", into = "ZZFeatureMapConfig")]
pub struct ZZFeatureMap {
    config: ZZFeatureMapConfig,
    pairs: Vec<(usize, usize)>,
}

impl ZZFeatureMap {
    /// Build a feature map from a configuration.
    pub fn new(config: ZZFeatureMapConfig) -> Result<Self> {
        config.validate()?;
        let pairs = config.entanglement.pairs(config.feature_dimension);
        Ok(Self { config, pairs })
    }

    /// Feature map with default repetitions and full entanglement.
    pub fn with_dimension(feature_dimension: usize) -> Result<Self> {
        Self::new(ZZFeatureMapConfig::with_dimension(feature_dimension))
    }

    /// Number of features (and qubits).
    pub fn feature_dimension(&self) -> usize {
        self.config.feature_dimension
    }

    /// Get the configuration.
    pub fn config(&self) -> &ZZFeatureMapConfig {
        &self.config
    }

    /// Encode `x` into `|psi(x)>`.
    pub fn encode(&self, x: ArrayView1<f64>) -> Result<Statevector> {
        let n = self.config.feature_dimension;
        if x.len() != n {
            return Err(QsvrError::dimension_mismatch(n, x.len()));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(QsvrError::numerical("feature vector contains non-finite values"));
        }

        let alpha = self.config.alpha;
        let mut state = Statevector::zero_state(n)?;

        for _ in 0..self.config.reps {
            for q in 0..n {
                state.apply_h(q);
            }
            for q in 0..n {
                state.apply_phase(q, alpha * x[q]);
            }
            for &(a, b) in &self.pairs {
                state.apply_parity_phase(a, b, alpha * (PI - x[a]) * (PI - x[b]));
            }
        }

        Ok(state)
    }
}

impl TryFrom<ZZFeatureMapConfig> for ZZFeatureMap {
    type Error = QsvrError;

    fn try_from(config: ZZFeatureMapConfig) -> Result<Self> {
        Self::new(config)
    }
}

impl From<ZZFeatureMap> for ZZFeatureMapConfig {
    fn from(map: ZZFeatureMap) -> Self {
        map.config
    }
}
