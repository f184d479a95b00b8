//! Error types for simlogue-solver.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("the matrix is singular")]
    SingularMatrix,

    #[error("singular matrix at step {step} (t = {time} s)")]
    Singular { step: usize, time: f64 },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("the simulation has terminated")]
    Terminated,

    #[error(transparent)]
    Circuit(#[from] simlogue_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
