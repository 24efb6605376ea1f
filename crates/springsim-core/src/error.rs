//! Error types for simulation operations.
//!
//! Only contract violations surface here. Numeric degeneracy inside the
//! solver is reported through [`crate::pcg::Termination`] instead.

use thiserror::Error;

/// Errors returned by fallible simulation operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// A vector or matrix does not match the size the solver was built for.
    #[error("dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Particle index is out of bounds.
    #[error("particle index {index} out of bounds (count: {count})")]
    ParticleOutOfBounds { index: usize, count: usize },

    /// Mass must be positive and finite.
    #[error("invalid mass {0}: must be positive and finite")]
    InvalidMass(f64),

    /// Spring parameters or endpoints are unusable.
    #[error("invalid spring: {0}")]
    InvalidSpring(String),

    /// Configuration value is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Convenience alias for `Result<T, SimError>`.
pub type SimResult<T> = Result<T, SimError>;

/// Fails with [`SimError::DimensionMismatch`] unless `actual == expected`.
pub(crate) fn check_len(what: &'static str, expected: usize, actual: usize) -> SimResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(SimError::DimensionMismatch {
            what,
            expected,
            actual,
        })
    }
}
