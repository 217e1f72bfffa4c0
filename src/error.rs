//! Error types for dictionary and hash-table operations.

use std::collections::TryReserveError;
use std::fmt;

use thiserror::Error;

/// What an allocation was for when it failed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum AllocTarget {
    HashTable,
    Buckets,
    Key,
    Value,
}

impl fmt::Display for AllocTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AllocTarget::HashTable => "hash table",
            AllocTarget::Buckets => "bucket array",
            AllocTarget::Key => "key",
            AllocTarget::Value => "value",
        })
    }
}

/// Errors that can occur during dictionary operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DictError {
    /// An allocation could not be satisfied. Any partial state of the
    /// failed call has been released.
    #[error("unable to allocate memory for {target} (size: {size})")]
    Allocation {
        target: AllocTarget,
        size: usize,
        #[source]
        source: TryReserveError,
    },

    /// The key is not present.
    #[error("unable to locate item")]
    NotFound,

    /// A registration was released while no dictionary was counted as live.
    #[error("attempting to destroy dict, but none is supposed to exist")]
    InvariantViolation,

    /// The context currently has no shared table.
    #[error("no hash table is available (expected number of dicts: {live})")]
    NoSharedTable { live: usize },

    /// A size or depth parameter is unusable.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: &'static str },
}

/// Coarse classification of a [`DictError`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    Allocation,
    NotFound,
    InvariantViolation,
    NoSharedTable,
    InvalidConfig,
}

impl DictError {
    pub(crate) fn allocation(target: AllocTarget, size: usize, source: TryReserveError) -> Self {
        DictError::Allocation {
            target,
            size,
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DictError::Allocation { .. } => ErrorKind::Allocation,
            DictError::NotFound => ErrorKind::NotFound,
            DictError::InvariantViolation => ErrorKind::InvariantViolation,
            DictError::NoSharedTable { .. } => ErrorKind::NoSharedTable,
            DictError::InvalidConfig { .. } => ErrorKind::InvalidConfig,
        }
    }
}

/// Convenience type alias for dictionary operations.
pub type Result<T> = std::result::Result<T, DictError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_and_kinds() {
        assert_eq!(DictError::NotFound.to_string(), "unable to locate item");
        assert_eq!(
            DictError::NoSharedTable { live: 0 }.to_string(),
            "no hash table is available (expected number of dicts: 0)"
        );
        assert_eq!(DictError::InvariantViolation.kind(), ErrorKind::InvariantViolation);

        let source = Vec::<u64>::new().try_reserve_exact(usize::MAX).unwrap_err();
        let e = DictError::allocation(AllocTarget::Key, 3, source);
        assert_eq!(e.kind(), ErrorKind::Allocation);
        assert!(e.to_string().starts_with("unable to allocate memory for key (size: 3)"));
        assert!(std::error::Error::source(&e).is_some());
    }
}
