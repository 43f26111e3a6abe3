use thiserror::Error;

pub type Result<T> = std::result::Result<T, SolveError>;

/// Failures that reach the caller of a solve. Placement failures on a single
/// residual are recovered internally and never show up here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolveError {
    #[error("plate pool exhausted after {used} plates with items still to cut")]
    OutOfPlates { used: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
