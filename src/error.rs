//
// symreg-gp - genetic programming for symbolic regression
//
// File description:
//   Module: error taxonomy.
//

use thiserror::Error;

/// Errors raised by the genetic programming engine.
///
/// `Configuration` and `Shape` surface before any evolutionary work begins;
/// `ProgramValidation` surfaces from [`crate::program::Program::from_tokens`].
/// Per-program evaluation failures during the evolution loop are *not*
/// represented here — they are folded into worst-possible fitness instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GpError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("invalid program: {0}")]
    ProgramValidation(String),

    #[error("shape mismatch: expected {expected} features, found {found}")]
    Shape { expected: usize, found: usize },

    #[error("unknown metric: {0}")]
    UnknownMetric(String),
}

pub type GpResult<T> = Result<T, GpError>;
