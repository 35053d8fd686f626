//! Non-fatal diagnostics recorded by the model facade.
//!
//! Warnings never abort an operation. They are logged through `tracing` when
//! issued and kept on the model so callers can inspect them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A warning issued by [`crate::Qsvr`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QsvrWarning {
    /// A `kernel` argument other than a quantum kernel was supplied and discarded.
    UnsupportedKernelArgument {
        /// Description of the discarded argument.
        argument: String,
    },
    /// The kernel was replaced after fitting; predictions keep the fitted kernel until refit.
    KernelChangedAfterFit,
}

impl fmt::Display for QsvrWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedKernelArgument { argument } => write!(
                f,
                "'kernel' argument {argument} is not supported and was discarded; \
                 supply a QuantumKernel instead"
            ),
            Self::KernelChangedAfterFit => write!(
                f,
                "kernel changed after fit; predictions use the fitted kernel until fit() is called again"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_display() {
        let w = QsvrWarning::UnsupportedKernelArgument {
            argument: "value 1".to_string(),
        };
        assert!(w.to_string().contains("value 1"));
        assert!(w.to_string().contains("QuantumKernel"));
        assert!(QsvrWarning::KernelChangedAfterFit.to_string().contains("fit()"));
    }
}
