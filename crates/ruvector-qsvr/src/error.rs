//! Error types for quantum kernel support vector regression.
//!
//! This module defines every error that can surface from kernel evaluation,
//! kernel matrix construction, the SVR solver, the model facade and model
//! persistence.

use thiserror::Error;

/// Result type alias for QSVR operations.
pub type Result<T> = std::result::Result<T, QsvrError>;

/// Errors that can occur while configuring, fitting, using or persisting a QSVR model.
#[derive(Error, Debug)]
pub enum QsvrError {
    /// The kernel (or its feature map) is missing or empty.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Dimension mismatch between vectors or matrices.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Actual dimension encountered.
        actual: usize,
    },

    /// Numerical failure: ill-conditioned kernel, non-finite values or solver non-convergence.
    #[error("Numerical error: {0}")]
    Numerical(String),

    /// `predict` or `score` was called before `fit`.
    #[error("Model is not fitted; call fit() first")]
    NotFitted,

    /// A persisted model holds a different model type than the one requested.
    #[error("Type mismatch: expected stored model '{expected}', found '{found}'")]
    TypeMismatch {
        /// Tag of the model type that attempted the load.
        expected: String,
        /// Tag found in the stored file.
        found: String,
    },

    /// Invalid parameter value provided.
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// Reason why the parameter is invalid.
        reason: String,
    },

    /// Empty sample set where at least one sample is required.
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// Filesystem failure while saving or loading a model.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl QsvrError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a dimension mismatch error.
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Create a numerical error.
    pub fn numerical(msg: impl Into<String>) -> Self {
        Self::Numerical(msg.into())
    }

    /// Create an invalid parameter error.
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }
}

impl From<serde_json::Error> for QsvrError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
