//! Error types for the fieldprobe engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FieldError>;

#[derive(Error, Debug)]
pub enum FieldError {
    /// Coordinate arity does not match the grid dimensionality.
    #[error("dimension mismatch: expected {expected} components, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// A coordinate component lies outside its admissible range.
    #[error("coordinate component {value} on axis {axis} outside [{lo}, {hi}]")]
    OutOfBounds {
        axis: usize,
        value: i64,
        lo: i64,
        hi: i64,
    },

    /// A regression solve failed even after the bounded retry.
    #[error("singular covariance system: {0}")]
    Singular(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failure reported by the oracle collaborator.
    #[error("oracle error: {0}")]
    Oracle(String),

    /// Failure reported by the sink collaborator.
    #[error("sink error: {0}")]
    Sink(String),
}

impl From<serde_json::Error> for FieldError {
    fn from(err: serde_json::Error) -> Self {
        FieldError::Sink(err.to_string())
    }
}
