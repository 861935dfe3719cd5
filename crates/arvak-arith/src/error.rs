//! Error types for arithmetic synthesis.

use arvak_rev::RevError;
use thiserror::Error;

/// Errors that can occur while synthesizing an arithmetic circuit.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ArithError {
    /// Operand widths that the algorithm cannot combine.
    #[error("{op}: {detail}")]
    WidthMismatch {
        /// Name of the operation.
        op: &'static str,
        /// Description of the mismatch.
        detail: String,
    },

    /// An operand with no wires.
    #[error("{op}: operand '{operand}' is empty")]
    EmptyOperand {
        /// Name of the operation.
        op: &'static str,
        /// Name of the empty operand.
        operand: &'static str,
    },

    /// Fixed-precision multiply with an unusable precision.
    #[error("Invalid precision {precision}: must be between 1 and {max}")]
    InvalidPrecision {
        /// Requested number of retained bits.
        precision: usize,
        /// Width of the full product.
        max: usize,
    },

    /// Error from the circuit engine.
    #[error("Circuit error: {0}")]
    Circuit(#[from] RevError),
}

/// Result type for arithmetic synthesis.
pub type ArithResult<T> = Result<T, ArithError>;

pub(crate) fn require_nonempty(
    op: &'static str,
    operand: &'static str,
    len: usize,
) -> ArithResult<()> {
    if len == 0 {
        return Err(ArithError::EmptyOperand { op, operand });
    }
    Ok(())
}
