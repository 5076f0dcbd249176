use std::collections::TryReserveError;

use thiserror::Error;

/// Errors returned by the fallible `try_*` operations of [`AvlTree`](crate::AvlTree).
///
/// The infallible operations never return these; they abort (allocation) or
/// panic (capacity) instead, the same way `Vec` does.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AvlError {
    /// The node arena could not grow.
    #[error("Failed to allocate tree node: {0}")]
    AllocationFailed(#[from] TryReserveError),

    /// The arena already holds the maximum number of addressable nodes.
    #[error("Tree cannot hold more than {max} nodes")]
    CapacityExceeded { max: usize },
}

pub type Result<T> = std::result::Result<T, AvlError>;
