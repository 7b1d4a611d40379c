//! Crate error type.

use thiserror::Error;

use crate::parallel::ParallelError;

/// Hard failures of the library.
///
/// Numerical non-convergence is not an error; it is reported through
/// [`crate::bisection::Status`] and recovered by the solvers.
#[derive(Debug, Error)]
pub enum EimError {
    #[error("buffer length mismatch: expected {expected}, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("a sampling grid needs at least two points, got {0}")]
    GridTooSmall(usize),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("worker failure: {0}")]
    Worker(String),

    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ParallelError<EimError>> for EimError {
    fn from(err: ParallelError<EimError>) -> Self {
        match err {
            ParallelError::Task { error, .. } => error,
            other => EimError::Worker(other.to_string()),
        }
    }
}
