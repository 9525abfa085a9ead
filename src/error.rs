use thiserror::Error;

/// Error type for batch pool operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// A batch was requested with zero workers.
    #[error("worker count must be at least 1")]
    ZeroWorkers,

    /// A batch was requested with more workers than the pool supports.
    #[error("requested {0} workers, exceeding the supported maximum")]
    TooManyWorkers(usize),

    /// The pool has been shut down and can no longer run batches.
    #[error("pool has been shut down")]
    Retired,
}

/// Result type alias for batch pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;
