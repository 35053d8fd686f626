//! Execution backends for fidelity estimation.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Binomial, Distribution};
use serde::{Deserialize, Serialize};

use crate::error::{QsvrError, Result};

/// How a state fidelity is turned into a kernel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionBackend {
    /// Exact fidelity from statevectors.
    #[default]
    Exact,
    /// Shot-based estimate of the all-zeros outcome probability of the
    /// compute/uncompute circuit, which equals the fidelity.
    Sampled {
        /// Number of circuit executions per kernel entry.
        shots: u64,
        /// Seed mixed into every per-pair sampler.
        seed: u64,
    },
}

impl ExecutionBackend {
    /// Shot-based backend.
    pub fn sampled(shots: u64, seed: u64) -> Self {
        Self::Sampled { shots, seed }
    }

    /// Whether kernel values are exact.
    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Exact)
    }

    /// Validate backend parameters.
    pub fn validate(&self) -> Result<()> {
        if let Self::Sampled { shots: 0, .. } = self {
            return Err(QsvrError::invalid_parameter("shots", "must be at least 1"));
        }
        Ok(())
    }

    /// Turn an exact fidelity into the value this backend reports for the pair `(x, y)`.
    ///
    /// Sampled estimates draw from a generator seeded by the backend seed and the
    /// bit patterns of both inputs, normalized so that `(x, y)` and `(y, x)` share
    /// a stream. The estimate is therefore reproducible and independent of the
    /// order in which pairs are evaluated.
    pub fn estimate(&self, fidelity: f64, x: &[f64], y: &[f64]) -> Result<f64> {
        match *self {
            Self::Exact => Ok(fidelity),
            Self::Sampled { shots, seed } => {
                if shots == 0 {
                    return Err(QsvrError::invalid_parameter("shots", "must be at least 1"));
                }
                let p = fidelity.clamp(0.0, 1.0);
                let binomial = Binomial::new(shots, p)
                    .map_err(|e| QsvrError::numerical(format!("invalid sampling distribution: {e}")))?;
                let mut rng = StdRng::seed_from_u64(pair_seed(seed, x, y));
                let zeros = binomial.sample(&mut rng);
                Ok(zeros as f64 / shots as f64)
            }
        }
    }
}

/// Order-independent seed for a pair of feature vectors.
fn pair_seed(seed: u64, x: &[f64], y: &[f64]) -> u64 {
    let hx = hash_vector(x);
    let hy = hash_vector(y);
    let (lo, hi) = if hx <= hy { (hx, hy) } else { (hy, hx) };
    splitmix64(seed ^ splitmix64(lo ^ splitmix64(hi)))
}

fn hash_vector(v: &[f64]) -> u64 {
    v.iter()
        .fold(0x9E37_79B9_7F4A_7C15u64, |acc, value| {
            splitmix64(acc ^ value.to_bits())
        })
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_passthrough() {
        let backend = ExecutionBackend::Exact;
        assert_eq!(backend.estimate(0.42, &[1.0], &[2.0]).unwrap(), 0.42);
        assert!(backend.is_exact());
    }

    #[test]
    fn test_sampled_reproducible_and_symmetric() {
        let backend = ExecutionBackend::sampled(1024, 10598);
        let x = [0.1, 0.2];
        let y = [0.7, 1.4];

        let a = backend.estimate(0.3, &x, &y).unwrap();
        let b = backend.estimate(0.3, &x, &y).unwrap();
        let c = backend.estimate(0.3, &y, &x).unwrap();

        assert_eq!(a, b);
        assert_eq!(a, c);
        assert!((0.0..=1.0).contains(&a));
        assert!((a - 0.3).abs() < 0.1, "estimate {a} too far from 0.3");
    }

    #[test]
    fn test_sampled_extremes() {
        let backend = ExecutionBackend::sampled(100, 1);
        assert_eq!(backend.estimate(1.0, &[0.0], &[0.0]).unwrap(), 1.0);
        assert_eq!(backend.estimate(0.0, &[0.0], &[1.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_zero_shots_rejected() {
        assert!(ExecutionBackend::sampled(0, 1).validate().is_err());
        assert!(ExecutionBackend::Exact.validate().is_ok());

        let err = ExecutionBackend::sampled(0, 1)
            .estimate(0.5, &[0.0], &[1.0])
            .unwrap_err();
        assert!(matches!(err, QsvrError::InvalidParameter { .. }));
    }

    #[test]
    fn test_pair_seed_depends_on_seed() {
        assert_ne!(pair_seed(1, &[0.5], &[0.25]), pair_seed(2, &[0.5], &[0.25]));
        assert_eq!(pair_seed(7, &[0.5], &[0.25]), pair_seed(7, &[0.25], &[0.5]));
    }
}
