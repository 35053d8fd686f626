//! Dense statevector simulation for the feature map circuits.
//!
//! Only the gates the ZZ feature map needs are provided: Hadamard, a
//! single-qubit phase `P(theta) = diag(1, e^{i theta})`, and a two-qubit
//! parity phase `CX(a,b) · P(theta) on b · CX(a,b)`, which multiplies every
//! basis state whose bits `a` and `b` differ by `e^{i theta}`.
//!
//! Qubit `q` is bit `q` of the basis index (little-endian ordering).

use ndarray::Array1;
use num_complex::Complex64;
use std::f64::consts::FRAC_1_SQRT_2;

use crate::error::{QsvrError, Result};

/// Largest register the simulator will allocate (2^20 amplitudes).
pub const MAX_QUBITS: usize = 20;

/// A pure quantum state over `n_qubits` qubits.
#[derive(Debug, Clone, PartialEq)]
pub struct Statevector {
    n_qubits: usize,
    amplitudes: Array1<Complex64>,
}

impl Statevector {
    /// Create the all-zeros state `|0...0>`.
    pub fn zero_state(n_qubits: usize) -> Result<Self> {
        if n_qubits == 0 || n_qubits > MAX_QUBITS {
            return Err(QsvrError::invalid_parameter(
                "n_qubits",
                format!("must be between 1 and {MAX_QUBITS}"),
            ));
        }

        let mut amplitudes = Array1::from_elem(1 << n_qubits, Complex64::new(0.0, 0.0));
        amplitudes[0] = Complex64::new(1.0, 0.0);

        Ok(Self {
            n_qubits,
            amplitudes,
        })
    }

    /// Number of qubits.
    pub fn n_qubits(&self) -> usize {
        self.n_qubits
    }

    /// Hilbert space dimension (2^n_qubits).
    pub fn dim(&self) -> usize {
        self.amplitudes.len()
    }

    /// Raw amplitudes.
    pub fn amplitudes(&self) -> &Array1<Complex64> {
        &self.amplitudes
    }

    /// Apply a Hadamard gate to `qubit`.
    pub fn apply_h(&mut self, qubit: usize) {
        let mask = 1usize << qubit;
        for i in 0..self.dim() {
            if i & mask == 0 {
                let a = self.amplitudes[i];
                let b = self.amplitudes[i | mask];
                self.amplitudes[i] = (a + b) * FRAC_1_SQRT_2;
                self.amplitudes[i | mask] = (a - b) * FRAC_1_SQRT_2;
            }
        }
    }

    /// Apply a phase gate `P(theta)` to `qubit`.
    pub fn apply_phase(&mut self, qubit: usize, theta: f64) {
        let mask = 1usize << qubit;
        let phase = Complex64::from_polar(1.0, theta);
        for (i, amp) in self.amplitudes.iter_mut().enumerate() {
            if i & mask != 0 {
                *amp *= phase;
            }
        }
    }

    /// Apply `e^{i theta}` to every basis state where bits `a` and `b` differ.
    pub fn apply_parity_phase(&mut self, a: usize, b: usize, theta: f64) {
        let phase = Complex64::from_polar(1.0, theta);
        for (i, amp) in self.amplitudes.iter_mut().enumerate() {
            if ((i >> a) ^ (i >> b)) & 1 == 1 {
                *amp *= phase;
            }
        }
    }

    /// Inner product `<self|other>`.
    pub fn inner(&self, other: &Statevector) -> Result<Complex64> {
        if self.dim() != other.dim() {
            return Err(QsvrError::dimension_mismatch(self.dim(), other.dim()));
        }

        Ok(self
            .amplitudes
            .iter()
            .zip(other.amplitudes.iter())
            .map(|(a, b)| a.conj() * b)
            .sum())
    }

    /// State fidelity `|<self|other>|^2`, clamped to `[0, 1]`.
    pub fn fidelity(&self, other: &Statevector) -> Result<f64> {
        Ok(self.inner(other)?.norm_sqr().clamp(0.0, 1.0))
    }

    /// Measurement probabilities in the computational basis.
    pub fn probabilities(&self) -> Array1<f64> {
        self.amplitudes.mapv(|a| a.norm_sqr())
    }

    /// Squared norm (1 for a valid state).
    pub fn norm_sqr(&self) -> f64 {
        self.amplitudes.iter().map(|a| a.norm_sqr()).sum()
    }
}
